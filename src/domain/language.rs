//! Language cache with by-code index, active subset and default pointer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::domain::snapshot::LazySnapshot;
use crate::error::Result;
use crate::source::{DataSource, Language};

#[derive(Debug, Default)]
struct LanguageSnapshot {
    /// Ordered by position, then code
    all: Vec<Language>,
    by_code: HashMap<String, usize>,
    active: Vec<Language>,
    default: Option<Language>,
}

impl LanguageSnapshot {
    fn build(mut languages: Vec<Language>) -> Self {
        languages.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.code.cmp(&b.code)));

        let by_code = languages
            .iter()
            .enumerate()
            .map(|(i, lang)| (lang.code.clone(), i))
            .collect();
        let active: Vec<Language> = languages.iter().filter(|l| l.is_active).cloned().collect();
        let default = active
            .iter()
            .find(|l| l.is_default)
            .or_else(|| active.first())
            .cloned();

        Self {
            all: languages,
            by_code,
            active,
            default,
        }
    }
}

// == Language Cache ==
/// Every language plus by-code, active and default indices, loaded together.
pub struct LanguageCache {
    source: Arc<dyn DataSource>,
    snapshot: LazySnapshot<LanguageSnapshot>,
}

impl LanguageCache {
    /// Creates an unloaded cache reading from `source`.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            snapshot: LazySnapshot::new("languages", |s: &LanguageSnapshot| s.all.len()),
        }
    }

    async fn load(&self) -> Result<LanguageSnapshot> {
        Ok(LanguageSnapshot::build(self.source.list_languages().await?))
    }

    /// Every language, inactive ones included.
    pub async fn get_all(&self) -> Result<Vec<Language>> {
        Ok(self.snapshot.read(|| self.load()).await?.all.clone())
    }

    /// Active languages in display order.
    pub async fn get_active(&self) -> Result<Vec<Language>> {
        Ok(self.snapshot.read(|| self.load()).await?.active.clone())
    }

    /// Language with this code, active or not.
    ///
    /// # Arguments
    /// * `code` - Language code, e.g. `en`
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Language>> {
        let snapshot = self.snapshot.read(|| self.load()).await?;
        Ok(snapshot.by_code.get(code).map(|&i| snapshot.all[i].clone()))
    }

    /// The flagged default among active languages, else the first active one.
    pub async fn get_default(&self) -> Result<Option<Language>> {
        Ok(self.snapshot.read(|| self.load()).await?.default.clone())
    }

    /// True if `code` names an active language.
    pub async fn is_valid_code(&self, code: &str) -> Result<bool> {
        let snapshot = self.snapshot.read(|| self.load()).await?;
        Ok(snapshot
            .by_code
            .get(code)
            .map(|&i| snapshot.all[i].is_active)
            .unwrap_or(false))
    }

    // == Invalidation ==

    /// Drops the loaded language list; the next read reloads it.
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
