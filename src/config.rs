use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::audio::DEFAULT_INTERRUPT_COMMAND;
use crate::store::DEFAULT_DATA_PATH;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_CLOCK_CHECK_SECS: u64 = 30;
const DEFAULT_CLOCK_DRIFT_SECS: u64 = 5;

// DRIFT_OFF_* environment settings
#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub addr: SocketAddr,
    pub interrupt_command: Option<String>, // None = log only
    pub clock_check_interval: Duration,
    pub clock_drift_threshold: Duration, // wall vs monotonic drift that counts as a change
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_path = lookup("DRIFT_OFF_DATA_PATH")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());

        let default_addr = SocketAddr::from(([127, 0, 0, 1], 3000));
        let addr = match lookup("DRIFT_OFF_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid DRIFT_OFF_ADDR, using {}", DEFAULT_ADDR);
                default_addr
            }),
            None => default_addr,
        };

        // Set-but-empty disables the command.
        let interrupt_command = match lookup("DRIFT_OFF_INTERRUPT_CMD") {
            Some(cmd) if cmd.trim().is_empty() => None,
            Some(cmd) => Some(cmd),
            None => Some(DEFAULT_INTERRUPT_COMMAND.to_string()),
        };

        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Self {
            data_path: PathBuf::from(data_path),
            addr,
            interrupt_command,
            clock_check_interval: Duration::from_secs(secs(
                "DRIFT_OFF_CLOCK_CHECK_SECS",
                DEFAULT_CLOCK_CHECK_SECS,
            )),
            clock_drift_threshold: Duration::from_secs(secs(
                "DRIFT_OFF_CLOCK_DRIFT_SECS",
                DEFAULT_CLOCK_DRIFT_SECS,
            )),
        }
    }
}
