//! Test source that parks chosen lookups until released.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use super::{
    ConfigEntry, DataSource, InMemorySource, Language, Menu, Page, SourceResult, TranslationMap,
};
use crate::cache::CacheContext;

/// Delegates to an [`InMemorySource`], except that lookups of `gated_slug`
/// or `gated_entity` block until [`GatedSource::release`] is called.
pub(crate) struct GatedSource {
    pub(crate) inner: Arc<InMemorySource>,
    gated_slug: String,
    gated_entity: i64,
    gate: Semaphore,
    entered: Notify,
}

impl GatedSource {
    pub(crate) fn new(inner: Arc<InMemorySource>, gated_slug: &str, gated_entity: i64) -> Self {
        Self {
            inner,
            gated_slug: gated_slug.to_string(),
            gated_entity,
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Resolves once a gated lookup is parked.
    pub(crate) async fn parked(&self) {
        self.entered.notified().await;
    }

    /// Lets every parked and future gated lookup through.
    pub(crate) fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl DataSource for GatedSource {
    async fn list_configs(&self) -> SourceResult<Vec<ConfigEntry>> {
        self.inner.list_configs().await
    }

    async fn list_languages(&self) -> SourceResult<Vec<Language>> {
        self.inner.list_languages().await
    }

    async fn list_menus(&self) -> SourceResult<Vec<Menu>> {
        self.inner.list_menus().await
    }

    async fn published_page_by_slug(&self, ctx: &CacheContext, slug: &str) -> SourceResult<Option<Page>> {
        if slug == self.gated_slug {
            self.pass().await;
        }
        self.inner.published_page_by_slug(ctx, slug).await
    }

    async fn published_page_by_id(&self, ctx: &CacheContext, id: i64) -> SourceResult<Option<Page>> {
        self.inner.published_page_by_id(ctx, id).await
    }

    async fn translations_for(&self, entity_type: &str, entity_id: i64) -> SourceResult<TranslationMap> {
        if entity_id == self.gated_entity {
            self.pass().await;
        }
        self.inner.translations_for(entity_type, entity_id).await
    }

    async fn translations_for_many(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
    ) -> SourceResult<HashMap<i64, TranslationMap>> {
        if entity_ids.contains(&self.gated_entity) {
            self.pass().await;
        }
        self.inner.translations_for_many(entity_type, entity_ids).await
    }
}
