//! API Routes
//!
//! Configures the Axum router with the admin and read-through endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_handler, invalidate_page_handler,
    invalidate_page_slug_handler, invalidate_translation_handler, page_handler, preload_handler,
    sitemap_handler, stats_handler, AppState,
};

/// Creates the router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/cache/clear", post(clear_handler))
        .route("/cache/preload", post(preload_handler))
        .route("/cache/invalidate/:domain", post(invalidate_handler))
        .route("/cache/pages/:id", delete(invalidate_page_handler))
        .route("/cache/pages/slug/:slug", delete(invalidate_page_slug_handler))
        .route(
            "/cache/translations/:entity_type/:id",
            delete(invalidate_translation_handler),
        )
        .route("/pages/:lang/:slug", get(page_handler))
        .route("/sitemap.xml", get(sitemap_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::config::Config;
    use crate::manager::CacheManager;
    use crate::source::{ContentData, InMemorySource};

    fn create_test_app() -> Router {
        let source = Arc::new(InMemorySource::new(ContentData::default()));
        let manager = CacheManager::new(source.clone(), source, &Config::default());
        create_router(AppState::new(Arc::new(manager)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_requires_post() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/cache/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_bad_page_id_rejected() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache/pages/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_page_not_found() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/pages/en/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
