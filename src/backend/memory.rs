//! In-process backend over a concurrent map.
//!
//! Values are copied on the way in and out. A capacity bound only triggers a
//! purge of expired entries; live entries are never evicted, so a full cache
//! keeps accepting writes past its bound.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{effective_ttl, Backend, BackendKind, StatsProvider};
use crate::cache::entry::expiry_from_now;
use crate::cache::lock::mutex_lock;
use crate::cache::{CacheStats, StatsCounter};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_cleanup_task, Sweep, SweepHandle};

const SOURCE: &str = "backend::memory";

#[derive(Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Instant,
    size: usize,
}

impl MemoryEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Memory implementation of [`Backend`].
#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    /// Approximate bytes held, keys included
    size: AtomicI64,
    default_ttl: Duration,
    /// Entry count that triggers an expired purge on insert, 0 = unbounded
    max_entries: usize,
    stats: StatsCounter,
    closed: AtomicBool,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            size: AtomicI64::new(0),
            default_ttl,
            max_entries,
            stats: StatsCounter::new(),
            closed: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        }
    }

    /// Starts the periodic expiry sweep. Zero interval disables it.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let mut sweeper = mutex_lock(&self.sweeper, SOURCE, "start_sweeper");
        if sweeper.is_none() {
            *sweeper = Some(spawn_cleanup_task(Arc::downgrade(self), "memory-backend", interval));
        }
    }

    /// Approximate bytes currently stored.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed).max(0) as u64
    }

    /// Number of stored entries, expired-but-unswept included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                self.size.fetch_sub(entry.size as i64, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn remove_entry(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.size.fetch_sub(entry.size as i64, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn remove_if_expired(&self, key: &str) {
        let now = Instant::now();
        if let Some((_, entry)) = self.entries.remove_if(key, |_, entry| entry.is_expired_at(now)) {
            self.size.fetch_sub(entry.size as i64, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;

        let now = Instant::now();
        let live = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => Some(entry.data.clone()),
            Some(_) => None,
            None => {
                self.stats.record_miss();
                return Err(CacheError::Miss);
            }
        };

        match live {
            Some(data) => {
                self.stats.record_hit();
                Ok(data)
            }
            None => {
                // Map guard is released above; removing here cannot deadlock.
                self.remove_if_expired(key);
                self.stats.record_miss();
                Err(CacheError::Miss)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.ensure_open()?;

        if self.max_entries > 0
            && self.entries.len() >= self.max_entries
            && !self.entries.contains_key(key)
        {
            let purged = self.purge_expired();
            debug!(purged, len = self.entries.len(), "Memory backend at capacity, purged expired entries");
        }

        let size = key.len() + value.len();
        let entry = MemoryEntry {
            data: value.to_vec(),
            expires_at: expiry_from_now(effective_ttl(ttl, self.default_ttl)),
            size,
        };

        self.size.fetch_add(size as i64, Ordering::Relaxed);
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            self.size.fetch_sub(previous.size as i64, Ordering::Relaxed);
        }
        self.stats.record_set();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.remove_entry(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        self.ensure_open()?;
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                self.size.fetch_sub(entry.size as i64, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.entries.clear();
        self.size.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired_at(now))
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(sweeper) = mutex_lock(&self.sweeper, SOURCE, "close").take() {
            sweeper.stop();
        }
        self.entries.clear();
        self.size.store(0, Ordering::Relaxed);
        debug!("Memory backend closed");
        Ok(())
    }

    fn stats_provider(&self) -> Option<&dyn StatsProvider> {
        Some(self)
    }
}

#[async_trait]
impl StatsProvider for MemoryBackend {
    async fn stats(&self) -> Result<CacheStats> {
        Ok(self.stats.snapshot(self.entries.len()).with_size(self.size()))
    }

    fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl Sweep for MemoryBackend {
    fn sweep_expired(&self) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        self.purge_expired()
    }
}
