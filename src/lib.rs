//! Content Cache - caching layer of a multi-tenant content server
//!
//! Provides a TTL store, memory and networked byte backends with fallback,
//! read-through domain caches for configuration, menus, languages,
//! translations, pages and the sitemap, and a manager coordinating them.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod manager;
pub mod models;
pub mod source;
pub mod tasks;
pub mod typed;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{CacheError, Result};
pub use manager::CacheManager;
pub use typed::TypedCache;
