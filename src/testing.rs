//! Recording fakes for the collaborators, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use parking_lot::Mutex;

use crate::audio::AudioInterrupt;
use crate::clock::Clock;
use crate::error::{AudioError, StorageError, TimerError};
use crate::models::AlarmInfo;
use crate::store::Storage;
use crate::timer::AlarmTimer;

/// 2026-10-15 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 15, hour, minute, 0)
        .unwrap()
}

pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<AlarmInfo>,
    saves: Mutex<Vec<AlarmInfo>>,
    loads: AtomicUsize,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
}

impl MemoryStorage {
    pub fn with(info: AlarmInfo) -> Self {
        Self {
            record: Mutex::new(info),
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> Vec<AlarmInfo> {
        self.saves.lock().clone()
    }

    pub fn stored(&self) -> AlarmInfo {
        *self.record.lock()
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }
}

fn io_failure() -> StorageError {
    StorageError::Io(std::io::Error::other("injected failure"))
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<AlarmInfo, StorageError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(io_failure());
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(*self.record.lock())
    }

    fn save(&self, info: &AlarmInfo) -> Result<(), StorageError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(io_failure());
        }
        *self.record.lock() = *info;
        self.saves.lock().push(*info);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Schedule(i64),
    Cancel,
}

#[derive(Default)]
pub struct RecordingTimer {
    calls: Mutex<Vec<TimerCall>>,
    fail: AtomicBool,
}

impl RecordingTimer {
    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().clone()
    }

    pub fn fail_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl AlarmTimer for RecordingTimer {
    fn schedule(&self, epoch_millis: i64) -> Result<(), TimerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TimerError::Closed);
        }
        self.calls.lock().push(TimerCall::Schedule(epoch_millis));
        Ok(())
    }

    fn cancel(&self) -> Result<(), TimerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TimerError::Closed);
        }
        self.calls.lock().push(TimerCall::Cancel);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    requests: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingAudio {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl AudioInterrupt for RecordingAudio {
    fn request_interrupt(&self) -> Result<(), AudioError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AudioError::Spawn {
                program: "fake".to_string(),
                source: std::io::Error::other("injected failure"),
            });
        }
        Ok(())
    }
}
