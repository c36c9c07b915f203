//! The one-slot deferred trigger behind an armed alarm.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::TimerError;
use crate::events::SystemEvent;

// Longest sleep handed to tokio. Only a hand-edited data file gets near it.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Arms and cancels a single deferred trigger.
///
/// There is at most one outstanding schedule: scheduling again replaces it.
/// An epoch at or before now fires as soon as possible. Cancelling with
/// nothing scheduled is a no-op.
pub trait AlarmTimer: Send + Sync {
    fn schedule(&self, epoch_millis: i64) -> Result<(), TimerError>;
    fn cancel(&self) -> Result<(), TimerError>;
}

/// In-process timer: a tokio task sleeps until the epoch, then delivers
/// [`SystemEvent::TimerFired`] to the event loop.
///
/// The sleep runs on the monotonic clock, so wall-clock jumps are only
/// picked up when the alarm is reconciled and rescheduled.
pub struct TokioAlarmTimer {
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<SystemEvent>,
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl TokioAlarmTimer {
    pub fn new(clock: Arc<dyn Clock>, events: mpsc::UnboundedSender<SystemEvent>) -> Self {
        Self {
            clock,
            events,
            slot: Mutex::new(None),
        }
    }
}

impl AlarmTimer for TokioAlarmTimer {
    fn schedule(&self, epoch_millis: i64) -> Result<(), TimerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        if self.events.is_closed() {
            return Err(TimerError::Closed);
        }

        let delay_ms = epoch_millis
            .saturating_sub(self.clock.now().timestamp_millis())
            .max(0);
        let delay = Duration::from_millis(delay_ms as u64).min(MAX_DELAY);
        let deadline = tokio::time::Instant::now() + delay;
        let events = self.events.clone();

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if events.send(SystemEvent::TimerFired).is_err() {
                warn!("Alarm timer fired after the event loop stopped");
            }
        });

        if let Some(previous) = self.slot.lock().replace(task) {
            previous.abort();
        }
        debug!(epoch_millis, delay_ms, "Alarm timer scheduled");
        Ok(())
    }

    fn cancel(&self) -> Result<(), TimerError> {
        if let Some(task) = self.slot.lock().take() {
            task.abort();
            debug!("Alarm timer cancelled");
        }
        Ok(())
    }
}

impl Drop for TokioAlarmTimer {
    fn drop(&mut self) {
        if let Some(task) = self.slot.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;
    use crate::testing::{FixedClock, at};

    fn timer() -> (TokioAlarmTimer, mpsc::UnboundedReceiver<SystemEvent>, i64) {
        let now = at(22, 0);
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = TokioAlarmTimer::new(Arc::new(FixedClock::new(now)), tx);
        (timer, rx, now.timestamp_millis())
    }

    async fn settle() {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_at_epoch() {
        let (timer, mut rx, now) = timer();
        timer.schedule(now + 60_000).unwrap();

        time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(rx.recv().await, Some(SystemEvent::TimerFired));
    }

    #[tokio::test(start_paused = true)]
    async fn past_epoch_fires_immediately() {
        let (timer, mut rx, now) = timer();
        timer.schedule(now - 5_000).unwrap();
        assert_eq!(rx.recv().await, Some(SystemEvent::TimerFired));
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_epochs_do_not_overflow() {
        let (timer, mut rx, _) = timer();
        timer.schedule(i64::MIN).unwrap();
        assert_eq!(rx.recv().await, Some(SystemEvent::TimerFired));

        timer.schedule(i64::MAX).unwrap();
        time::advance(Duration::from_secs(30 * 24 * 60 * 60)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let (timer, mut rx, now) = timer();
        timer.schedule(now + 60_000).unwrap();
        timer.cancel().unwrap();

        time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_schedule_is_noop() {
        let (timer, _rx, _) = timer();
        timer.cancel().unwrap();
        timer.cancel().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous() {
        let (timer, mut rx, now) = timer();
        timer.schedule(now + 60_000).unwrap();
        timer.schedule(now + 120_000).unwrap();

        time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        time::advance(Duration::from_secs(60)).await;
        assert_eq!(rx.recv().await, Some(SystemEvent::TimerFired));

        time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_event_loop_is_an_error() {
        let (timer, rx, now) = timer();
        drop(rx);
        assert!(matches!(timer.schedule(now), Err(TimerError::Closed)));
    }

    #[test]
    fn schedule_outside_runtime_is_an_error() {
        let (timer, _rx, now) = timer();
        assert!(matches!(timer.schedule(now), Err(TimerError::NoRuntime)));
    }
}
