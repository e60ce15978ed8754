//! In-memory data source seeded from a JSON fixture.
//!
//! Used by the binary when no database is wired in, and by tests, which
//! rely on its per-operation call counters to observe cache behaviour.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ConfigEntry, DataSource, Language, Menu, Page, SitemapSource, SitemapUrl, SourceError,
    SourceResult, TranslationLink, TranslationMap,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::CacheContext;

const SOURCE: &str = "source::memory";

/// A page row plus its publication state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPage {
    #[serde(flatten)]
    pub page: Page,
    #[serde(default = "published_default")]
    pub published: bool,
    /// Roles allowed to see the page; empty means everyone
    #[serde(default)]
    pub visible_to: Vec<String>,
}

fn published_default() -> bool {
    true
}

/// Everything the in-memory source serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentData {
    #[serde(default)]
    pub configs: Vec<ConfigEntry>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub menus: Vec<Menu>,
    #[serde(default)]
    pub pages: Vec<StoredPage>,
    #[serde(default)]
    pub translations: Vec<TranslationLink>,
    /// Category slugs
    #[serde(default)]
    pub categories: Vec<String>,
    /// Tag slugs
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Snapshot of how often each operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCalls {
    pub configs: usize,
    pub languages: usize,
    pub menus: usize,
    pub page_by_slug: usize,
    pub page_by_id: usize,
    pub translations: usize,
    pub translations_many: usize,
    pub sitemap: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    configs: AtomicUsize,
    languages: AtomicUsize,
    menus: AtomicUsize,
    page_by_slug: AtomicUsize,
    page_by_id: AtomicUsize,
    translations: AtomicUsize,
    translations_many: AtomicUsize,
    sitemap: AtomicUsize,
}

/// [`DataSource`] and [`SitemapSource`] over an in-process [`ContentData`].
#[derive(Debug, Default)]
pub struct InMemorySource {
    data: RwLock<ContentData>,
    calls: CallCounters,
    failing: AtomicBool,
}

impl InMemorySource {
    pub fn new(data: ContentData) -> Self {
        Self {
            data: RwLock::new(data),
            calls: CallCounters::default(),
            failing: AtomicBool::new(false),
        }
    }

    /// Loads a JSON fixture shaped like [`ContentData`].
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading content fixture {}", path.display()))?;
        let data: ContentData = serde_json::from_str(&raw)
            .with_context(|| format!("parsing content fixture {}", path.display()))?;
        Ok(Self::new(data))
    }

    /// Applies a write, as the admin side would. Caches are not told.
    pub fn update(&self, apply: impl FnOnce(&mut ContentData)) {
        apply(&mut rw_write(&self.data, SOURCE, "update"));
    }

    /// Makes every call fail with [`SourceError::Unavailable`] while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many times each operation has been called.
    pub fn calls(&self) -> SourceCalls {
        let c = &self.calls;
        SourceCalls {
            configs: c.configs.load(Ordering::SeqCst),
            languages: c.languages.load(Ordering::SeqCst),
            menus: c.menus.load(Ordering::SeqCst),
            page_by_slug: c.page_by_slug.load(Ordering::SeqCst),
            page_by_id: c.page_by_id.load(Ordering::SeqCst),
            translations: c.translations.load(Ordering::SeqCst),
            translations_many: c.translations_many.load(Ordering::SeqCst),
            sitemap: c.sitemap.load(Ordering::SeqCst),
        }
    }

    fn enter(&self, counter: &AtomicUsize) -> SourceResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("in-memory source set to fail".to_string()))
        } else {
            Ok(())
        }
    }

    fn find_page(&self, ctx: &CacheContext, matches: impl Fn(&Page) -> bool) -> Option<Page> {
        let data = rw_read(&self.data, SOURCE, "find_page");
        let visible: Vec<&StoredPage> = data
            .pages
            .iter()
            .filter(|p| p.published && matches(&p.page))
            .filter(|p| p.visible_to.is_empty() || p.visible_to.iter().any(|r| r == &ctx.role))
            .collect();

        visible
            .iter()
            .find(|p| p.page.language_code == ctx.language_code)
            .or_else(|| visible.first())
            .map(|p| p.page.clone())
    }

    fn translation_map(data: &ContentData, entity_type: &str, entity_id: i64) -> TranslationMap {
        data.translations
            .iter()
            .filter(|t| t.entity_type == entity_type && t.entity_id == entity_id)
            .map(|t| (t.language_code.clone(), t.target_id))
            .collect()
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn list_configs(&self) -> SourceResult<Vec<ConfigEntry>> {
        self.enter(&self.calls.configs)?;
        Ok(rw_read(&self.data, SOURCE, "list_configs").configs.clone())
    }

    async fn list_languages(&self) -> SourceResult<Vec<Language>> {
        self.enter(&self.calls.languages)?;
        Ok(rw_read(&self.data, SOURCE, "list_languages").languages.clone())
    }

    async fn list_menus(&self) -> SourceResult<Vec<Menu>> {
        self.enter(&self.calls.menus)?;
        Ok(rw_read(&self.data, SOURCE, "list_menus").menus.clone())
    }

    async fn published_page_by_slug(&self, ctx: &CacheContext, slug: &str) -> SourceResult<Option<Page>> {
        self.enter(&self.calls.page_by_slug)?;
        Ok(self.find_page(ctx, |p| p.slug == slug))
    }

    async fn published_page_by_id(&self, ctx: &CacheContext, id: i64) -> SourceResult<Option<Page>> {
        self.enter(&self.calls.page_by_id)?;
        Ok(self.find_page(ctx, |p| p.id == id))
    }

    async fn translations_for(&self, entity_type: &str, entity_id: i64) -> SourceResult<TranslationMap> {
        self.enter(&self.calls.translations)?;
        let data = rw_read(&self.data, SOURCE, "translations_for");
        Ok(Self::translation_map(&data, entity_type, entity_id))
    }

    async fn translations_for_many(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
    ) -> SourceResult<HashMap<i64, TranslationMap>> {
        self.enter(&self.calls.translations_many)?;
        let data = rw_read(&self.data, SOURCE, "translations_for_many");
        Ok(entity_ids
            .iter()
            .map(|id| (*id, Self::translation_map(&data, entity_type, *id)))
            .filter(|(_, map)| !map.is_empty())
            .collect())
    }
}

#[async_trait]
impl SitemapSource for InMemorySource {
    async fn homepage(&self) -> SourceResult<Vec<SitemapUrl>> {
        self.enter(&self.calls.sitemap)?;
        Ok(vec![SitemapUrl {
            loc: "/".to_string(),
            lastmod: None,
            changefreq: Some("daily".to_string()),
            priority: Some(1.0),
        }])
    }

    async fn published_pages(&self) -> SourceResult<Vec<SitemapUrl>> {
        self.enter(&self.calls.sitemap)?;
        let data = rw_read(&self.data, SOURCE, "published_pages");
        Ok(data
            .pages
            .iter()
            .filter(|p| p.published && p.visible_to.is_empty())
            .map(|p| SitemapUrl {
                loc: format!("/{}/{}", p.page.language_code, p.page.slug),
                lastmod: p.page.updated_at,
                changefreq: Some("weekly".to_string()),
                priority: Some(0.8),
            })
            .collect())
    }

    async fn categories(&self) -> SourceResult<Vec<SitemapUrl>> {
        self.enter(&self.calls.sitemap)?;
        let data = rw_read(&self.data, SOURCE, "categories");
        Ok(data
            .categories
            .iter()
            .map(|slug| SitemapUrl::new(format!("/category/{slug}")))
            .collect())
    }

    async fn tags(&self) -> SourceResult<Vec<SitemapUrl>> {
        self.enter(&self.calls.sitemap)?;
        let data = rw_read(&self.data, SOURCE, "tags");
        Ok(data
            .tags
            .iter()
            .map(|slug| SitemapUrl::new(format!("/tag/{slug}")))
            .collect())
    }
}
