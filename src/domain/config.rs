//! Site configuration cache.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::domain::snapshot::LazySnapshot;
use crate::error::Result;
use crate::source::DataSource;

// == Config Cache ==
/// All configuration entries, loaded together on first access.
pub struct ConfigCache {
    source: Arc<dyn DataSource>,
    snapshot: LazySnapshot<HashMap<String, String>>,
}

impl ConfigCache {
    /// Creates an unloaded cache reading from `source`.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            snapshot: LazySnapshot::new("config", HashMap::len),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        let entries = self.source.list_configs().await?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }

    /// Value for `key`, or `None` if the key is not configured.
    ///
    /// # Arguments
    /// * `key` - Configuration key, e.g. `site_name`
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.snapshot.read(|| self.load()).await?;
        Ok(values.get(key).cloned())
    }

    /// Value for `key`, or `default` if the key is not configured.
    pub async fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    /// Copy of every configured entry.
    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        Ok(self.snapshot.read(|| self.load()).await?.clone())
    }

    // == Invalidation ==

    /// Drops the loaded configuration; the next read reloads it.
    pub async fn invalidate(&self) {
        self.snapshot.invalidate().await;
    }

    /// True once a load has succeeded and no invalidation followed.
    pub async fn is_loaded(&self) -> bool {
        self.snapshot.is_loaded().await
    }

    // == Introspection ==

    /// Hit/miss/set counters plus the current item count.
    pub fn stats(&self) -> CacheStats {
        self.snapshot.stats()
    }

    /// Zeroes the counters and records the reset time.
    pub fn reset_stats(&self) {
        self.snapshot.reset_stats();
    }
}
