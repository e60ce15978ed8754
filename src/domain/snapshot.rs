//! Load-everything-on-miss snapshot shared by the config, language and menu caches.
//!
//! State moves `Unloaded -> Loading -> Loaded` under the exclusive lock and
//! back to `Unloaded` on invalidation. Readers take the shared lock first and
//! only escalate when nothing is loaded; the state is re-checked after
//! escalation so concurrent misses trigger a single load.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::cache::{CacheStats, StatsCounter};
use crate::error::{CacheError, Result};

#[derive(Debug)]
enum LoadState<T> {
    Unloaded,
    /// Only ever seen under the write lock, or after a load future was dropped
    Loading,
    Loaded(T),
}

impl<T> LoadState<T> {
    fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            LoadState::Unloaded | LoadState::Loading => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LazySnapshot<T> {
    name: &'static str,
    state: RwLock<LoadState<T>>,
    stats: StatsCounter,
    items: AtomicUsize,
    count: fn(&T) -> usize,
}

impl<T> LazySnapshot<T> {
    pub(crate) fn new(name: &'static str, count: fn(&T) -> usize) -> Self {
        Self {
            name,
            state: RwLock::new(LoadState::Unloaded),
            stats: StatsCounter::new(),
            items: AtomicUsize::new(0),
            count,
        }
    }

    /// Returns the loaded snapshot, running `load` first if nothing is loaded.
    ///
    /// A failed load leaves the snapshot unloaded and returns the error as-is.
    pub(crate) async fn read<F, Fut>(&self, load: F) -> Result<RwLockReadGuard<'_, T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Ok(snapshot) = RwLockReadGuard::try_map(self.state.read().await, LoadState::loaded) {
            self.stats.record_hit();
            return Ok(snapshot);
        }

        let mut state = self.state.write().await;
        if state.loaded().is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
            *state = LoadState::Loading;
            match load().await {
                Ok(value) => {
                    let items = (self.count)(&value);
                    *state = LoadState::Loaded(value);
                    self.items.store(items, Ordering::Relaxed);
                    self.stats.record_set();
                    debug!(cache = self.name, items, "Snapshot loaded");
                }
                Err(e) => {
                    *state = LoadState::Unloaded;
                    return Err(e);
                }
            }
        }

        RwLockReadGuard::try_map(state.downgrade(), LoadState::loaded)
            .map_err(|_| CacheError::Internal(format!("{} snapshot vanished after load", self.name)))
    }

    /// Discards the snapshot; the next read reloads.
    pub(crate) async fn invalidate(&self) {
        *self.state.write().await = LoadState::Unloaded;
        self.items.store(0, Ordering::Relaxed);
        debug!(cache = self.name, "Snapshot invalidated");
    }

    pub(crate) async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded().is_some()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.items.load(Ordering::Relaxed))
    }

    pub(crate) fn reset_stats(&self) {
        self.stats.reset();
    }
}
