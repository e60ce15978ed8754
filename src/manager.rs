//! Cache Manager
//!
//! Composition root for the caching layer. Owns every domain cache, a
//! general-purpose TTL store and, when configured, a distributed backend.
//! Write-side events are mapped here to the narrowest invalidation that keeps
//! readers correct.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{create_backend, Backend, BackendSelection, ManagerInfo};
use crate::cache::{CacheStats, TtlStore};
use crate::config::Config;
use crate::domain::{
    ConfigCache, LanguageCache, MenuCache, PageCache, SitemapCache, TranslationCache,
};
use crate::error::{CacheError, Result};
use crate::source::{DataSource, SitemapSource};
use crate::typed::TypedCache;

/// Manager-wide rollup plus the identity of the active backend.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    #[serde(flatten)]
    pub totals: CacheStats,
    #[serde(flatten)]
    pub info: ManagerInfo,
}

pub struct CacheManager {
    config: ConfigCache,
    menus: MenuCache,
    languages: LanguageCache,
    translations: TranslationCache,
    pages: PageCache,
    sitemap: SitemapCache,
    general: Arc<TtlStore<Vec<u8>>>,
    distributed: Option<Arc<dyn Backend>>,
    info: ManagerInfo,
    cleanup_interval: Duration,
    stopped: AtomicBool,
}

impl CacheManager {
    /// Memory-only manager with no distributed backend.
    pub fn new(
        data: Arc<dyn DataSource>,
        sitemap: Arc<dyn SitemapSource>,
        config: &Config,
    ) -> Self {
        Self::build(data, sitemap, config, None, ManagerInfo::memory())
    }

    /// Manager over an already selected distributed backend.
    pub fn with_backend(
        data: Arc<dyn DataSource>,
        sitemap: Arc<dyn SitemapSource>,
        config: &Config,
        selection: BackendSelection,
    ) -> Self {
        Self::build(data, sitemap, config, Some(selection.backend), selection.info)
    }

    /// Selects the distributed backend through the factory, then builds the manager.
    pub async fn from_config(
        data: Arc<dyn DataSource>,
        sitemap: Arc<dyn SitemapSource>,
        config: &Config,
    ) -> Result<Self> {
        let selection = create_backend(&config.backend).await?;
        info!(
            backend = %selection.info.backend_type,
            is_fallback = selection.info.is_fallback,
            url = %selection.info.backend_url,
            "Distributed cache backend selected"
        );
        Ok(Self::with_backend(data, sitemap, config, selection))
    }

    fn build(
        data: Arc<dyn DataSource>,
        sitemap: Arc<dyn SitemapSource>,
        config: &Config,
        distributed: Option<Arc<dyn Backend>>,
        info: ManagerInfo,
    ) -> Self {
        Self {
            config: ConfigCache::new(Arc::clone(&data)),
            menus: MenuCache::new(Arc::clone(&data)),
            languages: LanguageCache::new(Arc::clone(&data)),
            translations: TranslationCache::new(Arc::clone(&data), config.translation_max_entries),
            pages: PageCache::new(data),
            sitemap: SitemapCache::new(sitemap, config.site_url.clone(), config.sitemap_ttl),
            general: Arc::new(TtlStore::new(config.backend.default_ttl)),
            distributed,
            info,
            cleanup_interval: config.backend.cleanup_interval,
            stopped: AtomicBool::new(false),
        }
    }

    /// Starts the general store's expiry sweep.
    pub fn start(&self) {
        self.general.start_sweeper(self.cleanup_interval, "general-store");
        info!(
            interval_secs = self.cleanup_interval.as_secs(),
            "Cache manager started"
        );
    }

    /// Stops background work and closes the distributed backend. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.general.stop();
        if let Some(backend) = &self.distributed {
            if let Err(e) = backend.close().await {
                warn!(error = %e, "Failed to close distributed cache backend");
            }
        }
        info!("Cache manager stopped");
    }

    // == Invalidation ==

    /// Invalidates every domain cache, empties the general store and resets
    /// all statistics.
    pub async fn clear_all(&self) {
        self.config.invalidate().await;
        self.menus.invalidate().await;
        self.languages.invalidate().await;
        self.translations.invalidate().await;
        self.pages.invalidate().await;
        self.sitemap.invalidate().await;
        self.general.clear();

        self.config.reset_stats();
        self.menus.reset_stats();
        self.languages.reset_stats();
        self.translations.reset_stats();
        self.pages.reset_stats();
        self.sitemap.reset_stats();
        self.general.reset_stats();
        if let Some(provider) = self.distributed.as_deref().and_then(|b| b.stats_provider()) {
            provider.reset_stats();
        }
        info!("All caches cleared");
    }

    pub async fn invalidate_config(&self) {
        self.config.invalidate().await;
        debug!("Config cache invalidated");
    }

    pub async fn invalidate_menus(&self) {
        self.menus.invalidate().await;
        debug!("Menu cache invalidated");
    }

    /// Language changes can alter which translation links resolve, so the
    /// translation cache goes too.
    pub async fn invalidate_languages(&self) {
        self.languages.invalidate().await;
        self.translations.invalidate().await;
        debug!("Language and translation caches invalidated");
    }

    pub async fn invalidate_translation(&self, entity_type: &str, entity_id: i64) {
        self.translations.invalidate_entity(entity_type, entity_id).await;
        debug!(entity_type, entity_id, "Translation invalidated");
    }

    pub async fn invalidate_translations(&self) {
        self.translations.invalidate().await;
    }

    /// A page, category or tag changed. Page variants are dropped through the
    /// page cache's own reverse index, so only the sitemap is touched here.
    pub async fn invalidate_content(&self) {
        self.sitemap.invalidate().await;
        debug!("Sitemap invalidated after content change");
    }

    pub async fn invalidate_page(&self, id: i64) {
        self.pages.invalidate_page(id).await;
    }

    pub async fn invalidate_page_by_slug(&self, slug: &str) {
        self.pages.invalidate_by_slug(slug).await;
    }

    pub async fn invalidate_pages(&self) {
        self.pages.invalidate().await;
    }

    // == Statistics ==

    /// Per-cache statistics keyed by cache name.
    pub async fn all_stats(&self) -> BTreeMap<String, CacheStats> {
        let mut stats = BTreeMap::new();
        stats.insert("config".to_string(), self.config.stats());
        stats.insert("menus".to_string(), self.menus.stats());
        stats.insert("languages".to_string(), self.languages.stats());
        stats.insert("translations".to_string(), self.translations.stats());
        stats.insert("pages".to_string(), self.pages.stats());
        stats.insert("sitemap".to_string(), self.sitemap.stats());
        stats.insert("general".to_string(), self.general.stats());

        if let Some(provider) = self.distributed.as_deref().and_then(|b| b.stats_provider()) {
            match provider.stats().await {
                Ok(backend_stats) => {
                    stats.insert("distributed".to_string(), backend_stats);
                }
                Err(e) => warn!(error = %e, "Distributed cache stats unavailable"),
            }
        }
        stats
    }

    /// Sum of every cache's counters, hit rate recomputed from the sums.
    pub async fn total_stats(&self) -> ManagerStats {
        let all = self.all_stats().await;
        ManagerStats {
            totals: CacheStats::total(all.values()),
            info: self.info.clone(),
        }
    }

    // == Warm-up and health ==

    /// Loads config, menus, languages and the sitemap ahead of traffic.
    ///
    /// Every step is attempted. The first config, menu or language failure is
    /// returned after all steps ran; a sitemap failure is only logged.
    pub async fn preload(&self) -> Result<()> {
        let mut first_error: Option<CacheError> = None;

        if let Err(e) = self.config.get_all().await {
            warn!(error = %e, "Config preload failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.menus.get_all().await {
            warn!(error = %e, "Menu preload failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.languages.get_all().await {
            warn!(error = %e, "Language preload failed");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.sitemap.get().await {
            warn!(error = %e, "Sitemap preload failed");
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Caches preloaded");
                Ok(())
            }
        }
    }

    /// Pings the distributed backend; always healthy when memory-only.
    pub async fn health_check(&self) -> Result<()> {
        match &self.distributed {
            Some(backend) => backend.ping().await,
            None => Ok(()),
        }
    }

    // == Accessors ==

    pub fn info(&self) -> &ManagerInfo {
        &self.info
    }

    pub fn config(&self) -> &ConfigCache {
        &self.config
    }

    pub fn menus(&self) -> &MenuCache {
        &self.menus
    }

    pub fn languages(&self) -> &LanguageCache {
        &self.languages
    }

    pub fn translations(&self) -> &TranslationCache {
        &self.translations
    }

    pub fn pages(&self) -> &PageCache {
        &self.pages
    }

    pub fn sitemap(&self) -> &SitemapCache {
        &self.sitemap
    }

    /// General-purpose store for callers without a domain cache of their own.
    pub fn general(&self) -> &Arc<TtlStore<Vec<u8>>> {
        &self.general
    }

    pub fn distributed(&self) -> Option<&Arc<dyn Backend>> {
        self.distributed.as_ref()
    }

    /// Typed view over the distributed backend, if one is configured.
    pub fn typed<T>(&self) -> Option<TypedCache<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        self.distributed.as_ref().map(|b| TypedCache::new(Arc::clone(b)))
    }
}
