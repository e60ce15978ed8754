//! Cross-language translation link cache.
//!
//! Keyed entity type -> entity id -> [`TranslationMap`]. When the total
//! number of cached entities reaches the configured maximum, roughly half
//! of every type's entries are dropped before the next insert. This is a
//! coarse bound, not LRU: which entries go is unspecified.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, StatsCounter};
use crate::domain::flight::InFlight;
use crate::error::Result;
use crate::source::{DataSource, TranslationMap};

#[derive(Debug, Default)]
struct TranslationIndex {
    by_type: HashMap<String, HashMap<i64, TranslationMap>>,
    count: usize,
    /// Bumped by every invalidation; loads started under an older value are not stored
    generation: u64,
}

impl TranslationIndex {
    fn get(&self, entity_type: &str, entity_id: i64) -> Option<&TranslationMap> {
        self.by_type.get(entity_type)?.get(&entity_id)
    }

    fn insert(&mut self, entity_type: &str, entity_id: i64, map: TranslationMap, max_entries: usize) {
        let is_new = self.get(entity_type, entity_id).is_none();
        if is_new && max_entries > 0 && self.count >= max_entries {
            self.evict_half();
        }
        let previous = self
            .by_type
            .entry(entity_type.to_string())
            .or_default()
            .insert(entity_id, map);
        if previous.is_none() {
            self.count += 1;
        }
    }

    fn evict_half(&mut self) {
        let mut evicted = 0;
        for entities in self.by_type.values_mut() {
            let drop_count = (entities.len() + 1) / 2;
            let victims: Vec<i64> = entities.keys().take(drop_count).copied().collect();
            for id in victims {
                entities.remove(&id);
                evicted += 1;
            }
        }
        self.by_type.retain(|_, entities| !entities.is_empty());
        self.count -= evicted;
        debug!(evicted, remaining = self.count, "Translation cache evicted half its entries");
    }

    fn remove_entity(&mut self, entity_type: &str, entity_id: i64) {
        self.generation += 1;
        if let Some(entities) = self.by_type.get_mut(entity_type) {
            if entities.remove(&entity_id).is_some() {
                self.count -= 1;
            }
            if entities.is_empty() {
                self.by_type.remove(entity_type);
            }
        }
    }

    fn remove_type(&mut self, entity_type: &str) {
        self.generation += 1;
        if let Some(entities) = self.by_type.remove(entity_type) {
            self.count -= entities.len();
        }
    }

    fn clear(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}

// == Translation Cache ==
/// Read-through cache of translation links per entity.
///
/// Lookups of one entity share a single load; the data source is awaited
/// with no lock on the index, so hits never wait behind a slow load.
pub struct TranslationCache {
    source: Arc<dyn DataSource>,
    index: RwLock<TranslationIndex>,
    flights: InFlight,
    max_entries: usize,
    stats: StatsCounter,
    items: AtomicUsize,
}

impl TranslationCache {
    /// `max_entries` of 0 leaves the cache unbounded.
    pub fn new(source: Arc<dyn DataSource>, max_entries: usize) -> Self {
        Self {
            source,
            index: RwLock::new(TranslationIndex::default()),
            flights: InFlight::new(),
            max_entries,
            stats: StatsCounter::new(),
            items: AtomicUsize::new(0),
        }
    }

    async fn cached(&self, entity_type: &str, entity_id: i64) -> Option<TranslationMap> {
        self.index.read().await.get(entity_type, entity_id).cloned()
    }

    /// Copy of the translations of one entity, loading them on a miss.
    ///
    /// # Arguments
    /// * `entity_type` - Entity kind, e.g. `page` or `category`
    /// * `entity_id` - Entity id within that kind
    pub async fn get(&self, entity_type: &str, entity_id: i64) -> Result<TranslationMap> {
        if let Some(map) = self.cached(entity_type, entity_id).await {
            self.stats.record_hit();
            return Ok(map);
        }

        let _flight = self.flights.acquire(&format!("{entity_type}:{entity_id}")).await;
        if let Some(map) = self.cached(entity_type, entity_id).await {
            self.stats.record_hit();
            return Ok(map);
        }

        self.stats.record_miss();
        let generation = self.index.read().await.generation;
        let map = self.source.translations_for(entity_type, entity_id).await?;

        let mut index = self.index.write().await;
        if index.generation == generation {
            index.insert(entity_type, entity_id, map.clone(), self.max_entries);
            self.stats.record_set();
            self.items.store(index.count, Ordering::Relaxed);
        } else {
            debug!(entity_type, entity_id, "Translations invalidated while loading, result not cached");
        }
        Ok(map)
    }

    /// Translations of many entities. Cached ids are served directly; the
    /// rest are loaded in a single data-source call.
    ///
    /// # Arguments
    /// * `entity_type` - Entity kind shared by every id
    /// * `entity_ids` - Ids to resolve; duplicates are looked up once
    pub async fn get_batch(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
    ) -> Result<HashMap<i64, TranslationMap>> {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = entity_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut result = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        let generation = {
            let index = self.index.read().await;
            for id in &ids {
                match index.get(entity_type, *id) {
                    Some(map) => {
                        self.stats.record_hit();
                        result.insert(*id, map.clone());
                    }
                    None => missing.push(*id),
                }
            }
            index.generation
        };
        if missing.is_empty() {
            return Ok(result);
        }

        let mut loaded = self.source.translations_for_many(entity_type, &missing).await?;

        let mut index = self.index.write().await;
        let current = index.generation == generation;
        for id in missing {
            self.stats.record_miss();
            let map = loaded.remove(&id).unwrap_or_default();
            // Another load may have stored this id meanwhile
            if current && index.get(entity_type, id).is_none() {
                index.insert(entity_type, id, map.clone(), self.max_entries);
                self.stats.record_set();
            }
            result.insert(id, map);
        }
        if !current {
            debug!(entity_type, "Translations invalidated while loading, batch not cached");
        }
        self.items.store(index.count, Ordering::Relaxed);
        Ok(result)
    }

    // == Invalidation ==

    /// Drops one entity's translations.
    pub async fn invalidate_entity(&self, entity_type: &str, entity_id: i64) {
        let mut index = self.index.write().await;
        index.remove_entity(entity_type, entity_id);
        self.items.store(index.count, Ordering::Relaxed);
    }

    /// Drops every entity of one type.
    pub async fn invalidate_type(&self, entity_type: &str) {
        let mut index = self.index.write().await;
        index.remove_type(entity_type);
        self.items.store(index.count, Ordering::Relaxed);
    }

    /// Drops everything.
    pub async fn invalidate(&self) {
        self.index.write().await.clear();
        self.items.store(0, Ordering::Relaxed);
    }

    // == Introspection ==

    /// Cached entity count across all types.
    pub async fn len(&self) -> usize {
        self.index.read().await.count
    }

    /// True when no entity is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Hit/miss/set counters plus the cached entity count.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.items.load(Ordering::Relaxed))
    }

    /// Zeroes the counters and records the reset time.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}
