//! Content Cache - admin server for the content caching layer
//!
//! Loads configuration from the environment, builds the cache manager over
//! the in-memory data source and serves the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_cache::source::InMemorySource;
use content_cache::{create_router, AppState, CacheManager, Config};

/// Startup sequence:
/// 1. Initialize tracing
/// 2. Load configuration from environment variables
/// 3. Build the data source and the cache manager (backend via the factory)
/// 4. Start background sweeps and preload
/// 5. Serve until SIGINT/SIGTERM, then stop the manager
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting content cache server");

    let config = Config::from_env();
    info!(
        backend = %config.backend.kind,
        default_ttl_secs = config.backend.default_ttl.as_secs(),
        sitemap_ttl_secs = config.sitemap_ttl.as_secs(),
        port = config.server_port,
        "Configuration loaded"
    );

    let source = match &config.data_file {
        Some(path) => Arc::new(InMemorySource::from_json_file(path)?),
        None => {
            warn!("CONTENT_DATA_FILE not set, serving an empty data source");
            Arc::new(InMemorySource::default())
        }
    };

    let manager = Arc::new(
        CacheManager::from_config(source.clone(), source, &config)
            .await
            .context("building cache manager")?,
    );
    manager.start();
    if let Err(e) = manager.preload().await {
        warn!(error = %e, "Preload incomplete, caches will fill on demand");
    }

    let app = create_router(AppState::new(Arc::clone(&manager)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving admin API")?;

    manager.stop().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
