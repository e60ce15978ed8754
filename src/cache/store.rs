//! TTL Store Module
//!
//! Concurrency-safe key-value map where every entry carries an absolute
//! expiration time. Expiry is lazy on read; an optional background sweep
//! bounds memory between reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::cache::{CacheEntry, CacheStats, StatsCounter};
use crate::tasks::{spawn_cleanup_task, Sweep, SweepHandle};

const SOURCE: &str = "cache::store";

// == TTL Store ==
/// Generic TTL cache with lock-free statistics.
#[derive(Debug)]
pub struct TtlStore<V> {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    /// Performance statistics
    stats: StatsCounter,
    /// TTL applied by `set`
    default_ttl: Duration,
    /// Running background sweep, if any
    sweeper: Mutex<Option<SweepHandle>>,
}

impl<V: Clone> TtlStore<V> {
    // == Constructor ==
    /// Creates an empty store whose `set` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: StatsCounter::new(),
            default_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// TTL used by [`TtlStore::set`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Get ==
    /// Retrieves a live value.
    ///
    /// An expired entry is removed as a side effect and counts as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let entries = rw_read(&self.entries, SOURCE, "get");
            match entries.get(key) {
                None => {
                    self.stats.record_miss();
                    return None;
                }
                Some(entry) if !entry.is_expired() => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock; re-check under the write lock since a
        // writer may have replaced the entry in between.
        let mut entries = rw_write(&self.entries, SOURCE, "get.expire");
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_miss();
                debug!(key, "Expired entry removed on read");
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Returns true if a live entry exists. Does not touch statistics.
    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains")
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Set ==
    /// Stores a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores a value with an explicit TTL, replacing any previous entry whole.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, ttl);
        rw_write(&self.entries, SOURCE, "set").insert(key.into(), entry);
        self.stats.record_set();
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        rw_write(&self.entries, SOURCE, "delete").remove(key).is_some()
    }

    /// Removes every key starting with `prefix`; the empty prefix matches all.
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_by_prefix");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    // == Keys ==
    /// All stored keys, including expired entries not yet swept.
    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.entries, SOURCE, "keys").keys().cloned().collect()
    }

    // == Stats ==
    /// Returns current statistics; `items` may include unswept expired entries.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    /// Zeroes hit/miss/set counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "cleanup_expired");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Length ==
    /// Number of stored entries, expired-but-unswept included.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send + Sync + 'static> TtlStore<V> {
    /// Starts the background sweep. A second call while running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration, name: &'static str) {
        if interval.is_zero() {
            return;
        }
        let mut sweeper = mutex_lock(&self.sweeper, SOURCE, "start_sweeper");
        if sweeper.as_ref().map(SweepHandle::is_running).unwrap_or(false) {
            return;
        }
        *sweeper = Some(spawn_cleanup_task(Arc::downgrade(self), name, interval));
    }

    /// Stops the background sweep if running. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = mutex_lock(&self.sweeper, SOURCE, "stop").take() {
            handle.stop();
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Sweep for TtlStore<V> {
    fn sweep_expired(&self) -> usize {
        self.cleanup_expired()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn store() -> TtlStore<String> {
        TtlStore::new(Duration::from_secs(300))
    }

    #[test]
    fn test_store_new() {
        let store = store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let store = store();

        store.set("key1", "value1".to_string());

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        assert_eq!(store().get("nonexistent"), None);
    }

    #[test]
    fn test_store_delete() {
        let store = store();

        store.set("key1", "value1".to_string());
        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_overwrite() {
        let store = store();

        store.set("key1", "value1".to_string());
        store.set("key1", "value2".to_string());

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration_removes_entry() {
        let store = store();

        store.set_with_ttl("key1", "value1".to_string(), Duration::from_millis(50));
        assert!(store.get("key1").is_some());

        sleep(Duration::from_millis(80));

        assert_eq!(store.keys(), vec!["key1".to_string()]);
        assert_eq!(store.get("key1"), None);
        assert!(store.keys().is_empty(), "expired get should remove the entry");
    }

    #[test]
    fn test_overwrite_extends_expiry() {
        let store = store();

        store.set_with_ttl("key1", "short".to_string(), Duration::from_millis(30));
        store.set_with_ttl("key1", "long".to_string(), Duration::from_secs(60));
        sleep(Duration::from_millis(50));

        assert_eq!(store.get("key1"), Some("long".to_string()));
    }

    #[test]
    fn test_delete_by_prefix() {
        let store = store();
        store.set("page:en:1", "a".to_string());
        store.set("page:ru:1", "b".to_string());
        store.set("menu:main", "c".to_string());

        assert_eq!(store.delete_by_prefix("page:"), 2);
        assert_eq!(store.keys(), vec!["menu:main".to_string()]);
    }

    #[test]
    fn test_delete_by_empty_prefix_clears_everything() {
        let store = store();
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());

        assert_eq!(store.delete_by_prefix(""), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_stats() {
        let store = store();

        store.set("key1", "value1".to_string());
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.items, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }

    #[test]
    fn test_expired_get_counts_as_miss() {
        let store = store();
        store.set_with_ttl("k", "v".to_string(), Duration::from_millis(10));
        sleep(Duration::from_millis(30));

        store.get("k");
        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_reset_stats() {
        let store = store();
        store.set("k", "v".to_string());
        store.get("k");
        store.reset_stats();

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (0, 0, 0));
        assert!(stats.reset_at.is_some());
        assert_eq!(stats.items, 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let store = store();

        store.set_with_ttl("key1", "value1".to_string(), Duration::from_millis(20));
        store.set_with_ttl("key2", "value2".to_string(), Duration::from_secs(10));

        sleep(Duration::from_millis(50));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_and_stops() {
        let store = Arc::new(store());
        store.set_with_ttl("soon", "v".to_string(), Duration::from_millis(10));
        store.set("later", "v".to_string());

        store.start_sweeper(Duration::from_millis(20), "test");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.keys(), vec!["later".to_string()]);

        store.stop();
        store.stop();
    }

    #[test]
    fn test_stop_without_sweeper() {
        let store = store();
        store.stop();
        store.stop();
    }
}
