//! System events and the loop that routes them.
//!
//! Boot and clock changes queue a reconciliation on the writer; a fired
//! timer goes to the [`FireHandler`]. Failures are logged and the loop carries on: a
//! missed reconciliation is repaired by the next event, a dead loop is not.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::Clock;
use crate::fire::FireHandler;
use crate::service::MutationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    /// The host (re)started; any in-process timer is gone.
    Boot,

    /// Wall-clock time jumped relative to monotonic time.
    ClockChanged,

    /// The armed timer went off.
    TimerFired,
}

pub async fn run(
    mut events: mpsc::UnboundedReceiver<SystemEvent>,
    mutations: MutationService,
    fire: Arc<FireHandler>,
    running: CancellationToken,
) {
    trace!("Event loop started.");

    loop {
        tokio::select! {
            _ = running.cancelled() => {
                debug!("Event loop shutdown requested");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Event channel closed");
                    break;
                };
                dispatch(event, &mutations, &fire).await;
            }
        }
    }

    trace!("Event loop stopped.");
}

async fn dispatch(event: SystemEvent, mutations: &MutationService, fire: &FireHandler) {
    match event {
        SystemEvent::Boot | SystemEvent::ClockChanged => match mutations.reconcile().await {
            Ok(outcome) => info!(?event, ?outcome, "Alarm reconciled"),
            Err(e) => error!(?event, error = %e, "Alarm reconciliation failed"),
        },
        SystemEvent::TimerFired => fire.execute(),
    }
}

/// Watches for wall-clock jumps.
///
/// Every `interval`, compares how far the wall clock moved against how far
/// the monotonic clock moved. A difference beyond `threshold` means someone
/// changed the system time, and a [`SystemEvent::ClockChanged`] is sent.
pub struct ClockWatch {
    clock: Arc<dyn Clock>,
    interval: Duration,
    threshold: Duration,
    events: mpsc::UnboundedSender<SystemEvent>,
}

impl ClockWatch {
    pub fn new(
        clock: Arc<dyn Clock>,
        interval: Duration,
        threshold: Duration,
        events: mpsc::UnboundedSender<SystemEvent>,
    ) -> Self {
        Self {
            clock,
            interval,
            threshold,
            events,
        }
    }

    pub async fn run(self, running: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_wall = self.clock.now().timestamp_millis();
        let mut last_mono = Instant::now();

        loop {
            tokio::select! {
                _ = running.cancelled() => break,
                _ = ticker.tick() => {
                    let wall = self.clock.now().timestamp_millis();
                    let mono = Instant::now();
                    let drift = drift_millis(wall - last_wall, mono - last_mono);
                    last_wall = wall;
                    last_mono = mono;

                    if drift.unsigned_abs() > self.threshold.as_millis() as u64 {
                        info!(drift_ms = drift, "Wall clock changed");
                        if self.events.send(SystemEvent::ClockChanged).is_err() {
                            warn!("Event loop gone, clock watch stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Wall-clock movement minus monotonic movement, in millis.
fn drift_millis(wall_elapsed_ms: i64, mono_elapsed: Duration) -> i64 {
    wall_elapsed_ms - mono_elapsed.as_millis() as i64
}
