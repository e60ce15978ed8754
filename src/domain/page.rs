//! Published page cache.
//!
//! The same page renders differently per language and role, so entries are
//! keyed by [`CacheContext::key`]. Two forward maps (by slug key, by id key)
//! are kept in step with a reverse index from page id to every key derived
//! from that page, so one page's variants can be dropped without a scan.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheContext, CacheStats, StatsCounter, KEY_SEPARATOR};
use crate::domain::flight::InFlight;
use crate::error::Result;
use crate::source::{DataSource, Page, SourceResult};

/// A composite key tagged with the forward map it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageKey {
    Slug(String),
    Id(String),
}

/// Which forward map a lookup reads.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Slug,
    Id,
}

#[derive(Debug, Default)]
struct PageIndex {
    by_slug: HashMap<String, Page>,
    by_id: HashMap<String, Page>,
    reverse: HashMap<i64, Vec<PageKey>>,
    /// Bumped by every invalidation; loads started under an older value are not stored
    generation: u64,
}

impl PageIndex {
    fn find(&self, key: &str, lookup: Lookup) -> Option<&Page> {
        match lookup {
            Lookup::Slug => self.by_slug.get(key),
            Lookup::Id => self.by_id.get(key),
        }
    }

    fn store(&mut self, ctx: &CacheContext, page: &Page) {
        let slug_key = ctx.key(&page.slug);
        let id_key = ctx.key(page.id);

        self.by_slug.insert(slug_key.clone(), page.clone());
        self.by_id.insert(id_key.clone(), page.clone());

        let keys = self.reverse.entry(page.id).or_default();
        for key in [PageKey::Slug(slug_key), PageKey::Id(id_key)] {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    fn remove_page(&mut self, id: i64) -> usize {
        let Some(keys) = self.reverse.remove(&id) else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            let gone = match key {
                PageKey::Slug(key) => self.by_slug.remove(&key),
                PageKey::Id(key) => self.by_id.remove(&key),
            };
            removed += usize::from(gone.is_some());
        }
        removed
    }

    fn len(&self) -> usize {
        self.by_slug.len() + self.by_id.len()
    }
}

// == Page Cache ==
/// Read-through cache of published pages per viewer context.
///
/// Hits only take the shared lock. A miss waits on its own key's load, never
/// on loads of other keys, and the data source is awaited with no lock on
/// the maps.
pub struct PageCache {
    source: Arc<dyn DataSource>,
    index: RwLock<PageIndex>,
    flights: InFlight,
    stats: StatsCounter,
    items: AtomicUsize,
}

impl PageCache {
    /// Creates an empty cache loading from `source`.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            index: RwLock::new(PageIndex::default()),
            flights: InFlight::new(),
            stats: StatsCounter::new(),
            items: AtomicUsize::new(0),
        }
    }

    /// Published page visible in `ctx`, by slug.
    ///
    /// # Arguments
    /// * `ctx` - Viewer language and role
    /// * `slug` - Page slug
    ///
    /// # Returns
    /// `None` when no such page is visible; that outcome is not cached.
    pub async fn get_by_slug(&self, ctx: &CacheContext, slug: &str) -> Result<Option<Page>> {
        self.read_through(ctx, ctx.key(slug), Lookup::Slug, || {
            self.source.published_page_by_slug(ctx, slug)
        })
        .await
    }

    /// Published page visible in `ctx`, by id.
    ///
    /// # Arguments
    /// * `ctx` - Viewer language and role
    /// * `id` - Page id
    pub async fn get_by_id(&self, ctx: &CacheContext, id: i64) -> Result<Option<Page>> {
        self.read_through(ctx, ctx.key(id), Lookup::Id, || {
            self.source.published_page_by_id(ctx, id)
        })
        .await
    }

    async fn cached(&self, key: &str, lookup: Lookup) -> Option<Page> {
        self.index.read().await.find(key, lookup).cloned()
    }

    async fn read_through<F, Fut>(
        &self,
        ctx: &CacheContext,
        key: String,
        lookup: Lookup,
        load: F,
    ) -> Result<Option<Page>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SourceResult<Option<Page>>>,
    {
        if let Some(page) = self.cached(&key, lookup).await {
            self.stats.record_hit();
            return Ok(Some(page));
        }

        let _flight = self.flights.acquire(&key).await;
        if let Some(page) = self.cached(&key, lookup).await {
            self.stats.record_hit();
            return Ok(Some(page));
        }

        self.stats.record_miss();
        let generation = self.index.read().await.generation;
        let page = load().await?;

        if let Some(page) = &page {
            let mut index = self.index.write().await;
            if index.generation == generation {
                index.store(ctx, page);
                self.stats.record_set();
                self.items.store(index.len(), Ordering::Relaxed);
            } else {
                debug!(key = %key, "Page invalidated while loading, result not cached");
            }
        }
        Ok(page)
    }

    // == Invalidation ==

    /// Drops every language/role variant of one page via the reverse index.
    pub async fn invalidate_page(&self, id: i64) {
        let mut index = self.index.write().await;
        index.generation += 1;
        let removed = index.remove_page(id);
        self.items.store(index.len(), Ordering::Relaxed);
        debug!(page_id = id, removed, "Page variants invalidated");
    }

    /// Drops every page cached under `slug` in any context.
    ///
    /// Used when only the slug is known; this scans the slug map.
    pub async fn invalidate_by_slug(&self, slug: &str) {
        let mut index = self.index.write().await;
        index.generation += 1;

        let mut ids: Vec<i64> = index
            .by_slug
            .iter()
            .filter(|(key, _)| key_identifier(key) == Some(slug))
            .map(|(_, page)| page.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();

        for id in &ids {
            index.remove_page(*id);
            let id_text = id.to_string();
            index
                .by_id
                .retain(|key, _| key_identifier(key) != Some(id_text.as_str()));
        }
        // Entries stored under the slug with no reverse entry left
        index
            .by_slug
            .retain(|key, _| key_identifier(key) != Some(slug));

        self.items.store(index.len(), Ordering::Relaxed);
        debug!(slug, pages = ids.len(), "Pages invalidated by slug");
    }

    /// Drops every cached page.
    pub async fn invalidate(&self) {
        let mut index = self.index.write().await;
        let generation = index.generation + 1;
        *index = PageIndex {
            generation,
            ..PageIndex::default()
        };
        self.items.store(0, Ordering::Relaxed);
    }

    // == Introspection ==

    /// Number of composite keys recorded for `id` in the reverse index.
    pub async fn variant_count(&self, id: i64) -> usize {
        self.index.read().await.reverse.get(&id).map(Vec::len).unwrap_or(0)
    }

    /// Hit/miss/set counters plus the number of cached composite keys.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.items.load(Ordering::Relaxed))
    }

    /// Zeroes the counters and records the reset time.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// The identifier segment of a composite key: everything after the second
/// unescaped separator.
fn key_identifier(key: &str) -> Option<&str> {
    let mut parts = key.splitn(3, KEY_SEPARATOR);
    parts.next()?;
    parts.next()?;
    parts.next()
}
