//! Re-deriving timer state from the persisted intent.
//!
//! A reboot drops every scheduled timer, and a wall-clock change makes the
//! remaining delay of an armed timer wrong. Either way the stored alarm is
//! the ground truth: re-arm it if it is still ahead, fire it if it was
//! missed, leave things alone if nothing was pending.
//!
//! The [`Reconciler`] is owned by the writer task and runs between queued
//! mutations, so a disarm can never interleave with a re-arm.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::AudioInterrupt;
use crate::clock::Clock;
use crate::error::ReconcileError;
use crate::fire;
use crate::store::Storage;
use crate::timer::AlarmTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No alarm was pending.
    Idle,

    /// The alarm is still ahead and was re-armed for this epoch.
    Rescheduled(i64),

    /// The alarm was already due and has been fired.
    Fired,
}

pub struct Reconciler {
    storage: Arc<dyn Storage>,
    timer: Arc<dyn AlarmTimer>,
    clock: Arc<dyn Clock>,
    audio: Arc<dyn AudioInterrupt>,
}

impl Reconciler {
    pub fn new(
        storage: Arc<dyn Storage>,
        timer: Arc<dyn AlarmTimer>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioInterrupt>,
    ) -> Self {
        Self {
            storage,
            timer,
            clock,
            audio,
        }
    }

    /// Errors are returned as-is; nothing is retried.
    ///
    /// On [`ReconcileOutcome::Fired`] the interrupt has been requested and
    /// the caller still has to clear the alarm.
    pub fn execute(&self) -> Result<ReconcileOutcome, ReconcileError> {
        // Storage, not the cache: the cache may not reflect what survived.
        let info = self.storage.load()?;
        let now = self.clock.now();

        if info.is_active(now) {
            // Cancel first to drop any stale registration.
            self.timer.cancel()?;
            self.timer.schedule(info.alarm())?;
            info!(
                alarm = info.alarm(),
                minutes_left = info.minutes_till_alarm(now),
                "Pending alarm re-armed"
            );
            return Ok(ReconcileOutcome::Rescheduled(info.alarm()));
        }

        if info.is_past_due(now) {
            warn!(
                alarm = info.alarm(),
                late_ms = now.timestamp_millis() - info.alarm(),
                "Alarm missed its fire time, firing now"
            );
            fire::interrupt(self.audio.as_ref());
            return Ok(ReconcileOutcome::Fired);
        }

        debug!("No pending alarm to reconcile");
        Ok(ReconcileOutcome::Idle)
    }
}
