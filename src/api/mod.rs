//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health` - Backend health check
//! - `GET /stats` - Per-cache and total statistics
//! - `POST /cache/clear` - Invalidate everything and reset statistics
//! - `POST /cache/preload` - Warm config, menus, languages and sitemap
//! - `POST /cache/invalidate/:domain` - Invalidate one cache domain
//! - `DELETE /cache/pages/:id` - Drop every variant of a page
//! - `DELETE /cache/pages/slug/:slug` - Drop pages cached under a slug
//! - `DELETE /cache/translations/:entity_type/:id` - Drop one entity's translations
//! - `GET /pages/:lang/:slug?role=` - Read-through page lookup
//! - `GET /sitemap.xml` - Cached sitemap document

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
