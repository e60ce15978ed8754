//! Data Source Module
//!
//! The read-only collaborators the domain caches load from. Caches never
//! write through these traits.

mod entities;
mod memory;

#[cfg(test)]
pub(crate) mod gated;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheContext;

pub use entities::{
    ConfigEntry, Language, Menu, MenuItem, Page, SitemapUrl, TranslationLink, TranslationMap,
};
pub use memory::{ContentData, InMemorySource, SourceCalls, StoredPage};

/// Failure reported by the authoritative data source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Backing store could not be queried
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// Query ran but returned something unusable
    #[error("data source returned invalid data: {0}")]
    Invalid(String),
}

/// Convenience Result type for data-source calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Bulk read interface over content entities.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// All site configuration entries.
    async fn list_configs(&self) -> SourceResult<Vec<ConfigEntry>>;

    /// All languages, active or not.
    async fn list_languages(&self) -> SourceResult<Vec<Language>>;

    /// All menus with their items.
    async fn list_menus(&self) -> SourceResult<Vec<Menu>>;

    /// A published page visible in `ctx`, by slug.
    async fn published_page_by_slug(&self, ctx: &CacheContext, slug: &str) -> SourceResult<Option<Page>>;

    /// A published page visible in `ctx`, by id.
    async fn published_page_by_id(&self, ctx: &CacheContext, id: i64) -> SourceResult<Option<Page>>;

    /// Sibling translations of one entity.
    async fn translations_for(&self, entity_type: &str, entity_id: i64) -> SourceResult<TranslationMap>;

    /// Sibling translations of many entities in one pass. Ids without
    /// translations may be absent from the result.
    async fn translations_for_many(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
    ) -> SourceResult<HashMap<i64, TranslationMap>>;
}

/// Site-structure builder feeding the sitemap document.
#[async_trait]
pub trait SitemapSource: Send + Sync {
    async fn homepage(&self) -> SourceResult<Vec<SitemapUrl>>;

    async fn published_pages(&self) -> SourceResult<Vec<SitemapUrl>>;

    async fn categories(&self) -> SourceResult<Vec<SitemapUrl>>;

    async fn tags(&self) -> SourceResult<Vec<SitemapUrl>>;
}
