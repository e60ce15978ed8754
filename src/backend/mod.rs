//! Backend Module
//!
//! Storage-agnostic byte cache contract plus the memory and networked
//! implementations and the factory that picks between them.
//!
//! # Contract
//! - `get` returns [`CacheError::Miss`](crate::error::CacheError::Miss) for absent or expired keys
//! - a zero TTL means "use the backend default"
//! - every operation after `close` fails with
//!   [`CacheError::Closed`](crate::error::CacheError::Closed); `close` itself is idempotent

mod factory;
mod memory;
mod networked;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::error::Result;

pub use factory::{create_backend, redact_url, BackendSelection, ManagerInfo, REDACTED};
pub use memory::MemoryBackend;
pub use networked::RedisBackend;

/// Which storage mechanism backs a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Networked,
}

impl BackendKind {
    /// Parses a configured type name; anything unrecognised means memory.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "networked" | "redis" | "remote" => BackendKind::Networked,
            _ => BackendKind::Memory,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Networked => f.write_str("networked"),
        }
    }
}

/// Byte-oriented cache backend.
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Fetches a copy of the stored bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Stores a copy of `value`; `Duration::ZERO` selects the default TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Removes one key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Removes every key starting with `prefix`, returning the count removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Removes every key owned by this backend.
    async fn clear(&self) -> Result<()>;

    /// Returns true if a live entry exists.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Verifies the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Releases resources. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Statistics capability, for backends that can report it.
    fn stats_provider(&self) -> Option<&dyn StatsProvider> {
        None
    }
}

/// Optional capability: backends able to report hit/miss/set statistics.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Counters since the last reset, plus the current item count.
    ///
    /// Counting items may need a round trip to the backing service, so this
    /// can fail where the counters alone could not.
    async fn stats(&self) -> Result<CacheStats>;

    /// Zeroes the counters and records the reset time. Stored items stay.
    fn reset_stats(&self);
}

/// Resolves a per-call TTL against the backend default.
pub(crate) fn effective_ttl(ttl: Duration, default_ttl: Duration) -> Duration {
    if ttl.is_zero() {
        default_ttl
    } else {
        ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(BackendKind::parse("memory"), BackendKind::Memory);
        assert_eq!(BackendKind::parse("Redis"), BackendKind::Networked);
        assert_eq!(BackendKind::parse(" networked "), BackendKind::Networked);
        assert_eq!(BackendKind::parse(""), BackendKind::Memory);
    }

    #[test]
    fn test_effective_ttl() {
        let default = Duration::from_secs(300);
        assert_eq!(effective_ttl(Duration::ZERO, default), default);
        assert_eq!(effective_ttl(Duration::from_secs(5), default), Duration::from_secs(5));
    }
}
