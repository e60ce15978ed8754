//! Per-key load coalescing for the keyed domain caches.
//!
//! A miss takes the key's flight lock before going to the data source, so
//! concurrent misses on one key trigger a single load while misses on other
//! keys, and hits on anything, proceed untouched. No map lock is held while
//! the data source is awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "domain::flight";

type Slot = Arc<AsyncMutex<()>>;

/// Registry of in-progress loads, keyed by cache key.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    slots: Mutex<HashMap<String, Slot>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits until no other load for `key` is running, then claims it.
    ///
    /// The claim is released when the returned guard drops.
    pub(crate) async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let slot = {
            let mut slots = mutex_lock(&self.slots, SOURCE, "acquire");
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        let held = Arc::clone(&slot).lock_owned().await;
        FlightGuard {
            owner: self,
            key: key.to_string(),
            slot,
            held: Some(held),
        }
    }

    /// Keys with a load in progress or queued.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        mutex_lock(&self.slots, SOURCE, "len").len()
    }
}

/// Exclusive claim on one key's load.
pub(crate) struct FlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
    slot: Slot,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut slots = mutex_lock(&self.owner.slots, SOURCE, "release");
        self.held.take();
        // Registry plus this guard: nobody is queued behind us
        let idle = Arc::strong_count(&self.slot) == 2;
        if idle && slots.get(&self.key).is_some_and(|s| Arc::ptr_eq(s, &self.slot)) {
            slots.remove(&self.key);
        }
    }
}
