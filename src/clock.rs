use chrono::{DateTime, FixedOffset};

/// Wall-clock source. Injected so alarm arithmetic can be tested against a
/// pinned "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Local system time, at the host's current UTC offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        chrono::Local::now().fixed_offset()
    }
}
