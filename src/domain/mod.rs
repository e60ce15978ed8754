//! Domain Module
//!
//! Entity-specific read-through caches layered over a [`DataSource`]:
//! site configuration, menus, languages, translation links, published
//! pages and the generated sitemap document.
//!
//! [`DataSource`]: crate::source::DataSource

mod config;
mod flight;
mod language;
mod menu;
mod page;
mod sitemap;
pub(crate) mod snapshot;
mod translation;

pub use config::ConfigCache;
pub use language::LanguageCache;
pub use menu::MenuCache;
pub use page::PageCache;
pub use sitemap::SitemapCache;
pub use translation::TranslationCache;
