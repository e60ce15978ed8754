//! End-to-end cache scenarios through the public API.

use std::sync::Arc;
use std::time::Duration;

use content_cache::backend::{create_backend, Backend, BackendKind, MemoryBackend};
use content_cache::cache::{CacheContext, TtlStore};
use content_cache::config::BackendConfig;
use content_cache::domain::{ConfigCache, PageCache};
use content_cache::source::{ConfigEntry, ContentData, InMemorySource, Page, StoredPage};
use content_cache::{CacheError, TypedCache};
use serde::{Deserialize, Serialize};
use tokio_test::{assert_err, assert_ok};

fn acme() -> Arc<InMemorySource> {
    Arc::new(InMemorySource::new(ContentData {
        configs: vec![ConfigEntry {
            key: "site_name".to_string(),
            value: "Acme".to_string(),
        }],
        pages: vec![StoredPage {
            page: Page {
                id: 42,
                slug: "about".to_string(),
                title: "About".to_string(),
                body: String::new(),
                language_code: "en".to_string(),
                updated_at: None,
            },
            published: true,
            visible_to: Vec::new(),
        }],
        ..ContentData::default()
    }))
}

#[tokio::test]
async fn config_cache_loads_once_per_cycle() {
    let source = acme();
    let cache = ConfigCache::new(source.clone());

    assert_eq!(cache.get("site_name").await.unwrap().as_deref(), Some("Acme"));
    assert_eq!(source.calls().configs, 1);

    assert_eq!(cache.get("site_name").await.unwrap().as_deref(), Some("Acme"));
    assert_eq!(source.calls().configs, 1);

    cache.invalidate().await;
    assert_eq!(cache.get("site_name").await.unwrap().as_deref(), Some("Acme"));
    assert_eq!(source.calls().configs, 2);
}

#[tokio::test]
async fn concurrent_first_reads_share_one_load() {
    let source = acme();
    let cache = Arc::new(ConfigCache::new(source.clone()));

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("site_name").await })
        })
        .collect();
    for reader in readers {
        assert_ok!(reader.await.unwrap());
    }
    assert_eq!(source.calls().configs, 1);
}

#[tokio::test]
async fn page_variants_dropped_through_reverse_index() {
    let source = acme();
    let cache = PageCache::new(source.clone());
    let en = CacheContext::new("en", "anonymous");
    let ru = CacheContext::new("ru", "admin");

    assert_eq!(cache.get_by_slug(&en, "about").await.unwrap().map(|p| p.id), Some(42));
    assert_eq!(cache.get_by_slug(&ru, "about").await.unwrap().map(|p| p.id), Some(42));
    assert_eq!(cache.variant_count(42).await, 4);

    cache.invalidate_page(42).await;
    assert_eq!(cache.variant_count(42).await, 0);

    cache.get_by_slug(&en, "about").await.unwrap();
    cache.get_by_slug(&ru, "about").await.unwrap();
    assert_eq!(source.calls().page_by_slug, 4);
    assert_eq!(cache.stats().misses, 4);
}

#[test]
fn contexts_never_share_keys() {
    let a = CacheContext::new("en", "admin");
    let b = CacheContext::new("en", "anonymous");
    let c = CacheContext::new("ru", "admin");
    assert_ne!(a.key("about"), b.key("about"));
    assert_ne!(a.key("about"), c.key("about"));

    let defaults = CacheContext::new("", "");
    assert_eq!(defaults.language_code, "en");
    assert_eq!(defaults.role, "anonymous");
}

fn unreachable_config(fallback_to_memory: bool) -> BackendConfig {
    BackendConfig {
        kind: BackendKind::Networked,
        url: Some("redis://:hunter2@127.0.0.1:1/0".to_string()),
        fallback_to_memory,
        connect_timeout: Duration::from_millis(200),
        cleanup_interval: Duration::ZERO,
        ..BackendConfig::default()
    }
}

#[tokio::test]
async fn factory_falls_back_to_memory() {
    let selection = create_backend(&unreachable_config(true)).await.unwrap();
    assert_eq!(selection.info.backend_type, BackendKind::Memory);
    assert!(selection.info.is_fallback);
    assert!(!selection.info.backend_url.contains("hunter2"));
    assert_eq!(selection.backend.kind(), BackendKind::Memory);
    assert_ok!(selection.backend.close().await);
}

#[tokio::test]
async fn factory_propagates_without_fallback() {
    let result = create_backend(&unreachable_config(false)).await;
    let err = assert_err!(result);
    assert!(matches!(err, CacheError::BackendUnavailable(_) | CacheError::Timeout));
    assert!(!err.to_string().contains("hunter2"));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct MenuState {
    open: Vec<String>,
}

#[tokio::test]
async fn typed_adapter_treats_corruption_as_absent() {
    let backend = Arc::new(MemoryBackend::new(Duration::from_secs(60), 0));
    let typed: TypedCache<MenuState> = TypedCache::new(backend.clone());
    let state = MenuState {
        open: vec!["main".to_string()],
    };

    typed.set("menu:state", &state, Duration::ZERO).await.unwrap();
    assert_eq!(typed.get("menu:state").await.unwrap(), Some(state));

    backend.set("menu:state", &[0xde, 0xad, 0xbe, 0xef], Duration::ZERO).await.unwrap();
    assert_eq!(typed.get("menu:state").await.unwrap(), None);
}

#[tokio::test]
async fn ttl_store_expires_lazily() {
    let store: TtlStore<String> = TtlStore::new(Duration::from_secs(60));
    store.set_with_ttl("short", "v".to_string(), Duration::from_millis(20));
    assert_eq!(store.get("short").as_deref(), Some("v"));

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(store.keys().contains(&"short".to_string()), "expired keys linger until read");
    assert!(store.get("short").is_none());
    assert!(store.is_empty());

    let stats = store.stats();
    assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
}

#[tokio::test]
async fn closed_backend_rejects_everything() {
    let backend = MemoryBackend::new(Duration::from_secs(60), 0);
    backend.set("k", b"v", Duration::ZERO).await.unwrap();

    assert_ok!(backend.close().await);
    assert_ok!(backend.close().await);
    assert!(matches!(backend.get("k").await, Err(CacheError::Closed)));
    assert!(matches!(backend.has("k").await, Err(CacheError::Closed)));
    assert!(matches!(backend.delete("k").await, Err(CacheError::Closed)));
    assert!(matches!(backend.clear().await, Err(CacheError::Closed)));
}
