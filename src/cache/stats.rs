//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses and sets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::stats";

// == Stats Counter ==
/// Lock-free hit/miss/set counters shared by every cache.
#[derive(Debug, Default)]
pub struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    reset_at: Mutex<Option<DateTime<Utc>>>,
}

impl StatsCounter {
    /// Creates a counter with everything at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the set counter.
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Zeroes all counters and records when that happened.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        *mutex_lock(&self.reset_at, SOURCE, "reset") = Some(Utc::now());
    }

    /// Takes a snapshot, filling in the caller's current item count.
    pub fn snapshot(&self, items: usize) -> CacheStats {
        CacheStats::from_counts(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
            items,
        )
        .with_reset_at(*mutex_lock(&self.reset_at, SOURCE, "snapshot"))
    }
}

// == Cache Stats ==
/// Point-in-time statistics for one cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Successful lookups
    pub hits: u64,
    /// Lookups of absent or expired keys
    pub misses: u64,
    /// Writes
    pub sets: u64,
    /// Entries held when the snapshot was taken
    pub items: usize,
    /// hits / (hits + misses) as a percentage, 0 when there were no lookups
    pub hit_rate: f64,
    /// Approximate stored bytes, for backends that track it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last time the counters were reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Builds stats from raw counters, deriving the hit rate.
    pub fn from_counts(hits: u64, misses: u64, sets: u64, items: usize) -> Self {
        Self {
            hits,
            misses,
            sets,
            items,
            hit_rate: hit_rate(hits, misses),
            size: None,
            reset_at: None,
        }
    }

    /// Attaches an approximate size in bytes.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Attaches the last reset timestamp.
    pub fn with_reset_at(mut self, reset_at: Option<DateTime<Utc>>) -> Self {
        self.reset_at = reset_at;
        self
    }

    /// Sums raw counters across caches and recomputes the hit rate from the sums.
    pub fn total<'a>(stats: impl IntoIterator<Item = &'a CacheStats>) -> CacheStats {
        let mut total = CacheStats::default();
        let mut size = None;
        for s in stats {
            total.hits += s.hits;
            total.misses += s.misses;
            total.sets += s.sets;
            total.items += s.items;
            if let Some(bytes) = s.size {
                size = Some(size.unwrap_or(0) + bytes);
            }
        }
        total.hit_rate = hit_rate(total.hits, total.misses);
        total.size = size;
        total
    }
}

/// Percentage of lookups that were hits.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}
