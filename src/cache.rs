//! The authoritative in-process copy of the alarm intent.
//!
//! The cache is loaded lazily from [`Storage`] the first time anyone asks
//! for it, and from then on is only changed through [`InfoCache::post`].
//! Every subscriber gets its own queue, so each one sees the full sequence
//! of posted values in publish order.

use std::sync::{Arc, Weak};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::StorageError;
use crate::models::AlarmInfo;
use crate::store::Storage;

#[derive(Default)]
struct CacheState {
    value: Option<AlarmInfo>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<AlarmInfo>)>,
    next_id: u64,
}

impl CacheState {
    fn publish(&mut self, info: AlarmInfo) {
        // Receivers that are gone get pruned here.
        self.subscribers.retain(|(_, tx)| tx.send(info).is_ok());
    }
}

/// Lazily initialized, observable holder of the current [`AlarmInfo`].
///
/// Cheap to clone; clones share the same cell and subscribers.
#[derive(Clone)]
pub struct InfoCache {
    storage: Arc<dyn Storage>,
    state: Arc<Mutex<CacheState>>,
}

impl InfoCache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Return the cached value, loading it from storage on first use.
    ///
    /// The load happens under the cache lock, so concurrent first callers
    /// share one load. A failed load leaves the cache uninitialized and is
    /// returned to the caller.
    pub fn current(&self) -> Result<AlarmInfo, StorageError> {
        let mut state = self.state.lock();
        if let Some(info) = state.value {
            return Ok(info);
        }

        let info = self.storage.load()?;
        info!(
            alarm = info.alarm(),
            time = %info.setpoint_label(),
            "Alarm info loaded"
        );
        state.value = Some(info);
        state.publish(info);
        Ok(info)
    }

    /// Replace the cached value and notify every subscriber.
    ///
    /// Posting before the cache was ever initialized is dropped: there is
    /// nothing to replace yet, and the first load will read storage anyway.
    pub fn post(&self, info: AlarmInfo) {
        let mut state = self.state.lock();
        if state.value.is_none() {
            debug!(alarm = info.alarm(), "Dropping post to uninitialized cache");
            return;
        }
        state.value = Some(info);
        state.publish(info);
    }

    /// Subscribe to the current value and every later post.
    ///
    /// If the cache is already loaded the subscription receives the current
    /// value immediately. Otherwise a load is started on a blocking worker
    /// and the value arrives once it completes. If that load fails the
    /// subscription is closed, so `recv` returns `None`; observing again
    /// retries the load.
    pub fn observe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let loaded = match state.value {
            Some(info) => tx.send(info).is_ok(),
            None => false,
        };
        state.subscribers.push((id, tx));
        drop(state);

        if !loaded {
            self.spawn_load(id);
        }

        Subscription {
            id,
            rx,
            state: Arc::downgrade(&self.state),
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn spawn_load(&self, id: u64) {
        let cache = self.clone();
        let load = move || {
            if let Err(e) = cache.current() {
                error!(error = %e, "Failed to load alarm info for subscriber");
                // Dropping the sender closes the subscription.
                cache.state.lock().subscribers.retain(|(sub, _)| *sub != id);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(load);
            }
            Err(_) => load(),
        }
    }
}

/// A live feed of [`AlarmInfo`] values from an [`InfoCache`].
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// removes it from the cache.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<AlarmInfo>,
    state: Weak<Mutex<CacheState>>,
}

impl Subscription {
    /// Wait for the next value. `None` once the cache is gone.
    pub async fn recv(&mut self) -> Option<AlarmInfo> {
        self.rx.recv().await
    }

    /// Next value if one is already queued.
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<AlarmInfo> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}

    pub fn into_stream(self) -> impl Stream<Item = AlarmInfo> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            let info = sub.recv().await?;
            Some((info, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
