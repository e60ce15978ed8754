//! Cache Module
//!
//! Generic in-memory caching primitives: TTL entries, the TTL store,
//! statistics, and viewer-context composite keys.

mod context;
pub(crate) mod entry;
pub(crate) mod lock;
mod stats;
mod store;


// Re-export public types
pub use context::{CacheContext, ANONYMOUS_ROLE, DEFAULT_LANGUAGE, KEY_SEPARATOR};
pub use entry::CacheEntry;
pub use stats::{hit_rate, CacheStats, StatsCounter};
pub use store::TtlStore;
