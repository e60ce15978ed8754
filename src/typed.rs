//! Typed Cache Adapter
//!
//! Binds a value type to a byte [`Backend`] through `serde_json`, so callers
//! never handle raw buffers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{CacheError, Result};

/// A [`Backend`] viewed as a store of `T`.
///
/// Undecodable bytes read back as absent; the next write replaces them.
pub struct TypedCache<T> {
    backend: Arc<dyn Backend>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCache")
            .field("backend", &self.backend)
            .field("value", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            _value: PhantomData,
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Cached value for `key`. Misses and undecodable entries are `Ok(None)`;
    /// backend failures are errors.
    pub async fn get(&self, key: &str) -> Result<Option<T>> {
        let bytes = match self.backend.get(key).await {
            Ok(bytes) => bytes,
            Err(CacheError::Miss) => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Encodes and stores `value`. A zero `ttl` selects the backend default.
    pub async fn set(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.set(key, &bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.backend.has(key).await
    }

    /// Read-through: the cached value, or `loader`'s result stored then
    /// returned. A failing loader leaves the cache untouched.
    ///
    /// Backend trouble on either side is logged and the loader's value is
    /// still returned.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        match self.get(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Cache read failed, loading directly"),
        }

        let value = loader().await?;
        if let Err(e) = self.set(key, &value, ttl).await {
            warn!(key, error = %e, "Failed to cache loaded value");
        }
        Ok(value)
    }

    /// Values for every key that is present and decodable.
    pub async fn get_multiple(&self, keys: &[&str]) -> Result<HashMap<String, T>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert((*key).to_string(), value);
            }
        }
        Ok(found)
    }

    /// Stores each pair in turn, stopping at the first failure.
    pub async fn set_multiple(&self, items: &[(&str, T)], ttl: Duration) -> Result<()> {
        for (key, value) in items {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    /// Deletes each key in turn, stopping at the first failure.
    pub async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.backend.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::source::SourceError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            visits: 3,
        }
    }

    fn setup() -> (Arc<MemoryBackend>, TypedCache<Profile>) {
        let backend = Arc::new(MemoryBackend::new(Duration::from_secs(60), 0));
        (backend.clone(), TypedCache::new(backend))
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (_, cache) = setup();
        assert_eq!(cache.get("p").await.unwrap(), None);

        cache.set("p", &profile("ann"), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("p").await.unwrap(), Some(profile("ann")));
        assert!(cache.has("p").await.unwrap());

        cache.delete("p").await.unwrap();
        assert_eq!(cache.get("p").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_bytes_read_as_absent() {
        let (backend, cache) = setup();
        cache.set("p", &profile("ann"), Duration::ZERO).await.unwrap();
        backend.set("p", b"\xff{not json", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("p").await.unwrap(), None);

        cache.set("p", &profile("bob"), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("p").await.unwrap(), Some(profile("bob")));
    }

    #[tokio::test]
    async fn test_get_or_set_only_caches_success() {
        let (_, cache) = setup();

        let failed = cache
            .get_or_set("p", Duration::ZERO, || async {
                Err(CacheError::Source(SourceError::Unavailable("db down".to_string())))
            })
            .await;
        assert!(failed.is_err());
        assert!(!cache.has("p").await.unwrap());

        let loaded = cache
            .get_or_set("p", Duration::ZERO, || async { Ok(profile("ann")) })
            .await
            .unwrap();
        assert_eq!(loaded, profile("ann"));

        let cached = cache
            .get_or_set("p", Duration::ZERO, || async { Ok(profile("other")) })
            .await
            .unwrap();
        assert_eq!(cached, profile("ann"));
    }

    #[tokio::test]
    async fn test_batch_operations() {
        let (_, cache) = setup();
        cache
            .set_multiple(&[("a", profile("a")), ("b", profile("b"))], Duration::ZERO)
            .await
            .unwrap();

        let found = cache.get_multiple(&["a", "b", "c"]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["b"], profile("b"));

        cache.delete_multiple(&["a", "c"]).await.unwrap();
        let found = cache.get_multiple(&["a", "b"]).await.unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_closed_backend_is_an_error() {
        let (backend, cache) = setup();
        backend.close().await.unwrap();
        assert!(matches!(cache.get("p").await, Err(CacheError::Closed)));
        assert!(matches!(
            cache.set("p", &profile("ann"), Duration::ZERO).await,
            Err(CacheError::Closed)
        ));
    }
}
