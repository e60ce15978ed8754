//! API Handlers
//!
//! Admin endpoints over the [`CacheManager`], plus read-through page and
//! sitemap lookups.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::cache::CacheContext;
use crate::error::{CacheError, Result};
use crate::manager::CacheManager;
use crate::models::{ActionResponse, HealthResponse, PageQuery, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager>,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }
}

/// Handler for GET /health
///
/// 200 when the distributed backend answers (or there is none), 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let info = state.manager.info().clone();
    match state.manager.health_check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy(info))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::degraded(info, e.to_string())),
        ),
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let caches = state.manager.all_stats().await;
    let total = state.manager.total_stats().await;
    Json(StatsResponse { caches, total })
}

/// Handler for POST /cache/clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ActionResponse> {
    state.manager.clear_all().await;
    Json(ActionResponse::new("All caches cleared"))
}

/// Handler for POST /cache/preload
pub async fn preload_handler(State(state): State<AppState>) -> Result<Json<ActionResponse>> {
    state.manager.preload().await?;
    Ok(Json(ActionResponse::new("Caches preloaded")))
}

/// Handler for POST /cache/invalidate/:domain
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<ActionResponse>> {
    let manager = &state.manager;
    match domain.as_str() {
        "config" => manager.invalidate_config().await,
        "menus" => manager.invalidate_menus().await,
        "languages" => manager.invalidate_languages().await,
        "translations" => manager.invalidate_translations().await,
        "content" => manager.invalidate_content().await,
        "pages" => manager.invalidate_pages().await,
        other => {
            return Err(CacheError::InvalidRequest(format!(
                "unknown cache domain '{}'",
                other
            )))
        }
    }
    info!(domain = %domain, "Cache domain invalidated");
    Ok(Json(ActionResponse::new(format!("Cache '{}' invalidated", domain))))
}

/// Handler for DELETE /cache/pages/:id
pub async fn invalidate_page_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<ActionResponse> {
    state.manager.invalidate_page(id).await;
    Json(ActionResponse::new(format!("Page {} invalidated", id)))
}

/// Handler for DELETE /cache/pages/slug/:slug
pub async fn invalidate_page_slug_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Json<ActionResponse> {
    state.manager.invalidate_page_by_slug(&slug).await;
    Json(ActionResponse::new(format!("Page '{}' invalidated", slug)))
}

/// Handler for DELETE /cache/translations/:entity_type/:id
pub async fn invalidate_translation_handler(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, i64)>,
) -> Json<ActionResponse> {
    state.manager.invalidate_translation(&entity_type, id).await;
    Json(ActionResponse::new(format!(
        "Translations of {} {} invalidated",
        entity_type, id
    )))
}

/// Handler for GET /pages/:lang/:slug
///
/// Read-through page lookup in the context of `lang` and `?role=`.
pub async fn page_handler(
    State(state): State<AppState>,
    Path((lang, slug)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    let ctx = CacheContext::new(lang, query.role());
    match state.manager.pages().get_by_slug(&ctx, &slug).await? {
        Some(page) => Ok(Json(page).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Page '{}' not found", slug) })),
        )
            .into_response()),
    }
}

/// Handler for GET /sitemap.xml
pub async fn sitemap_handler(State(state): State<AppState>) -> Result<Response> {
    let document = state.manager.sitemap().get().await?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        document.as_ref().clone(),
    )
        .into_response())
}
