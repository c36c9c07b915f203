//! The only writer of the alarm intent.
//!
//! [`MutationService`] is a handle onto a single writer task. Callers enqueue
//! a [`Mutation`] and return immediately; the writer applies mutations one
//! at a time, so `set_time`, `arm` and `disarm` calls form a total order.
//! Completion is observed through [`InfoCache::observe`]. Reconciliation
//! runs on the same task, so it is ordered with the user's mutations.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::AudioInterrupt;
use crate::cache::InfoCache;
use crate::clock::Clock;
use crate::error::{MutationError, ReconcileError, ServiceError};
use crate::models::{AlarmInfo, validate_setpoint};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::store::Storage;
use crate::timer::AlarmTimer;

type ReconcileReply = oneshot::Sender<Result<ReconcileOutcome, ReconcileError>>;

#[derive(Debug)]
pub enum Mutation {
    /// Change the display setpoint. Leaves the timer alone.
    SetTime { hour: u32, minute: u32 },

    /// Arm the alarm for the next occurrence of the setpoint.
    Arm,

    /// Cancel the timer and clear the alarm.
    Disarm,

    /// Re-derive timer state from storage. A missed alarm is fired and
    /// cleared before the next mutation is taken.
    Reconcile { reply: ReconcileReply },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::SetTime { .. } => "set_time",
            Mutation::Arm => "arm",
            Mutation::Disarm => "disarm",
            Mutation::Reconcile { .. } => "reconcile",
        }
    }
}

/// Applies mutations against the cache, storage and timer.
pub struct Mutator {
    cache: InfoCache,
    storage: Arc<dyn Storage>,
    timer: Arc<dyn AlarmTimer>,
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
}

impl Mutator {
    pub fn new(
        cache: InfoCache,
        storage: Arc<dyn Storage>,
        timer: Arc<dyn AlarmTimer>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioInterrupt>,
    ) -> Self {
        let reconciler = Reconciler::new(storage.clone(), timer.clone(), clock.clone(), audio);
        Self {
            cache,
            storage,
            timer,
            clock,
            reconciler,
        }
    }

    /// Apply one mutation to completion. Failures are logged; there is no
    /// caller left to hand them to.
    pub fn apply(&self, mutation: Mutation) {
        let name = mutation.name();
        let result = match mutation {
            Mutation::SetTime { hour, minute } => self.set_time(hour, minute),
            Mutation::Arm => self.arm(),
            Mutation::Disarm => self.disarm(),
            Mutation::Reconcile { reply } => {
                if reply.send(self.reconcile()).is_err() {
                    debug!("Reconcile requester went away");
                }
                return;
            }
        };

        if let Err(e) = result {
            error!(mutation = name, error = %e, "Alarm mutation failed");
        }
    }

    fn set_time(&self, hour: u32, minute: u32) -> Result<(), MutationError> {
        let current = self.cache.current()?;
        self.commit(current.with_time(hour, minute)?)
    }

    fn arm(&self) -> Result<(), MutationError> {
        let current = self.cache.current()?;
        let alarm = current.next_occurrence(self.clock.now());

        // Nothing is committed unless the timer accepted the schedule.
        self.timer.schedule(alarm)?;
        self.commit(current.with_alarm(alarm))
    }

    fn disarm(&self) -> Result<(), MutationError> {
        if let Err(e) = self.timer.cancel() {
            warn!(error = %e, "Failed to cancel alarm timer, clearing alarm anyway");
        }

        let current = self.cache.current()?;
        self.commit(current.with_alarm(0))
    }

    fn reconcile(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let outcome = self.reconciler.execute()?;
        if outcome == ReconcileOutcome::Fired {
            if let Err(e) = self.disarm() {
                error!(error = %e, "Failed to clear missed alarm");
            }
        }
        Ok(outcome)
    }

    // Persist then publish, unless nothing changed.
    fn commit(&self, info: AlarmInfo) -> Result<(), MutationError> {
        if info == self.cache.current()? {
            debug!(alarm = info.alarm(), "Alarm info unchanged, nothing to commit");
            return Ok(());
        }

        if let Err(e) = self.storage.save(&info) {
            warn!(error = %e, "Failed to persist alarm info, publishing anyway");
        }
        self.cache.post(info);

        info!(
            alarm = info.alarm(),
            time = %info.setpoint_label(),
            "Alarm info committed"
        );
        Ok(())
    }

    async fn run(self, mut mutations: mpsc::UnboundedReceiver<Mutation>) {
        let mutator = Arc::new(self);
        while let Some(mutation) = mutations.recv().await {
            // Storage is blocking I/O; keep it off the async workers but
            // still wait for it before taking the next mutation.
            let name = mutation.name();
            let worker = mutator.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || worker.apply(mutation)).await {
                error!(mutation = name, error = %e, "Alarm mutation panicked");
            }
        }
        debug!("Mutation queue closed");
    }
}

/// Fire-and-forget handle onto the writer task.
#[derive(Clone)]
pub struct MutationService {
    tx: mpsc::UnboundedSender<Mutation>,
}

impl MutationService {
    /// Start the writer task. It runs until every handle is dropped.
    pub fn spawn(mutator: Mutator) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(mutator.run(rx));
        (Self { tx }, task)
    }

    /// Change the setpoint. Out-of-range values are rejected here, before
    /// anything is queued.
    pub fn set_time(&self, hour: u32, minute: u32) -> Result<(), ServiceError> {
        validate_setpoint(hour, minute)?;
        self.send(Mutation::SetTime { hour, minute })
    }

    pub fn arm(&self) -> Result<(), ServiceError> {
        self.send(Mutation::Arm)
    }

    pub fn disarm(&self) -> Result<(), ServiceError> {
        self.send(Mutation::Disarm)
    }

    /// Queue a reconciliation and wait for its outcome.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Mutation::Reconcile { reply })
            .map_err(|_| ReconcileError::Closed)?;
        outcome.await.map_err(|_| ReconcileError::Closed)?
    }

    fn send(&self, mutation: Mutation) -> Result<(), ServiceError> {
        self.tx.send(mutation).map_err(|_| ServiceError::Closed)
    }
}
