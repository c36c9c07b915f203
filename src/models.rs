use chrono::{DateTime, FixedOffset};

use crate::error::InvalidSetpoint;
use crate::logic;

pub const DEFAULT_ALARM: i64 = 0;
pub const DEFAULT_TIME_HOUR: u32 = 21;
pub const DEFAULT_TIME_MINUTE: u32 = 30;

// Current alarm intent. Changes build a new value; equality over all
// three fields decides whether a change is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmInfo {
    alarm: i64,       // epoch millis, 0 = no pending alarm
    time_hour: u32,   // 0..=23
    time_minute: u32, // 0..=59
}

impl Default for AlarmInfo {
    fn default() -> Self {
        Self {
            alarm: DEFAULT_ALARM,
            time_hour: DEFAULT_TIME_HOUR,
            time_minute: DEFAULT_TIME_MINUTE,
        }
    }
}

pub fn validate_setpoint(hour: u32, minute: u32) -> Result<(), InvalidSetpoint> {
    if hour > 23 || minute > 59 {
        return Err(InvalidSetpoint { hour, minute });
    }
    Ok(())
}

impl AlarmInfo {
    pub fn new(alarm: i64, time_hour: u32, time_minute: u32) -> Result<Self, InvalidSetpoint> {
        validate_setpoint(time_hour, time_minute)?;
        Ok(Self {
            alarm,
            time_hour,
            time_minute,
        })
    }

    pub fn alarm(&self) -> i64 {
        self.alarm
    }

    pub fn time_hour(&self) -> u32 {
        self.time_hour
    }

    pub fn time_minute(&self) -> u32 {
        self.time_minute
    }

    pub fn with_alarm(self, alarm: i64) -> Self {
        Self { alarm, ..self }
    }

    pub fn with_time(self, time_hour: u32, time_minute: u32) -> Result<Self, InvalidSetpoint> {
        Self::new(self.alarm, time_hour, time_minute)
    }

    pub fn millis_till_alarm(&self, now: DateTime<FixedOffset>) -> i64 {
        logic::millis_until(self.alarm, now)
    }

    // Rounded up: 1..=60 min -> 1, 61..=120 min -> 2
    pub fn hours_till_alarm(&self, now: DateTime<FixedOffset>) -> i64 {
        logic::ceil_units(self.millis_till_alarm(now), logic::MILLIS_PER_HOUR)
    }

    pub fn minutes_till_alarm(&self, now: DateTime<FixedOffset>) -> i64 {
        logic::ceil_units(self.millis_till_alarm(now), logic::MILLIS_PER_MINUTE)
    }

    pub fn is_active(&self, now: DateTime<FixedOffset>) -> bool {
        self.alarm > now.timestamp_millis()
    }

    // Set, but the fire time passed without being handled
    pub fn is_past_due(&self, now: DateTime<FixedOffset>) -> bool {
        self.alarm > 0 && !self.is_active(now)
    }

    pub fn next_occurrence(&self, now: DateTime<FixedOffset>) -> i64 {
        logic::next_occurrence(self.time_hour, self.time_minute, now)
    }

    // "HH:MM"
    pub fn setpoint_label(&self) -> String {
        format!("{:02}:{:02}", self.time_hour, self.time_minute)
    }
}
