use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::models::{AlarmInfo, DEFAULT_ALARM, DEFAULT_TIME_HOUR, DEFAULT_TIME_MINUTE};

pub const DEFAULT_DATA_PATH: &str = "data/alarm.json";

// Nothing stored yet is not an error: load() returns the defaults.
pub trait Storage: Send + Sync {
    fn load(&self) -> Result<AlarmInfo, StorageError>;
    fn save(&self, info: &AlarmInfo) -> Result<(), StorageError>;
}

// On-disk layout. Missing keys fall back to the defaults.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlarmRecord {
    #[serde(default = "default_alarm")]
    alarm: i64,
    #[serde(default = "default_time_hour")]
    time_hour: u32,
    #[serde(default = "default_time_minute")]
    time_minute: u32,
}

fn default_alarm() -> i64 {
    DEFAULT_ALARM
}

fn default_time_hour() -> u32 {
    DEFAULT_TIME_HOUR
}

fn default_time_minute() -> u32 {
    DEFAULT_TIME_MINUTE
}

impl From<&AlarmInfo> for AlarmRecord {
    fn from(info: &AlarmInfo) -> Self {
        Self {
            alarm: info.alarm(),
            time_hour: info.time_hour(),
            time_minute: info.time_minute(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<AlarmInfo, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AlarmInfo::default()),
            Err(e) => return Err(e.into()),
        };
        let record: AlarmRecord = serde_json::from_str(&text)?;
        Ok(AlarmInfo::new(
            record.alarm,
            record.time_hour,
            record.time_minute,
        )?)
    }

    fn save(&self, info: &AlarmInfo) -> Result<(), StorageError> {
        let tmp_path = self.tmp_path();
        let text = serde_json::to_string_pretty(&AlarmRecord::from(info))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
