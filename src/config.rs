//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::BackendKind;

/// Settings consumed by the backend factory.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Which backend to build
    pub kind: BackendKind,
    /// Connection URL for the networked backend
    pub url: Option<String>,
    /// Namespace prepended to every networked key
    pub prefix: String,
    /// TTL applied when a caller passes a zero TTL
    pub default_ttl: Duration,
    /// Maximum number of entries for the memory backend, 0 = unbounded
    pub max_size: usize,
    /// Interval between expiry sweeps, zero disables the sweep
    pub cleanup_interval: Duration,
    /// Build a memory backend when the networked one cannot connect
    pub fallback_to_memory: bool,
    /// Deadline for establishing the networked connection
    pub connect_timeout: Duration,
    /// Deadline for each networked operation
    pub op_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            url: None,
            prefix: "content:".to_string(),
            default_ttl: Duration::from_secs(300),
            max_size: 10_000,
            cleanup_interval: Duration::from_secs(60),
            fallback_to_memory: true,
            connect_timeout: Duration::from_millis(2_000),
            op_timeout: Duration::from_millis(1_000),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selection and tuning
    pub backend: BackendConfig,
    /// How long a generated sitemap stays fresh
    pub sitemap_ttl: Duration,
    /// Cap on cached translation maps across all entity types
    pub translation_max_entries: usize,
    /// Absolute base URL used for sitemap locations
    pub site_url: String,
    /// JSON fixture seeding the in-memory data source
    pub data_file: Option<PathBuf>,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TYPE` - `memory` or `networked`/`redis` (default: memory)
    /// - `CACHE_URL` - networked backend URL (default: none)
    /// - `CACHE_PREFIX` - key namespace (default: `content:`)
    /// - `CACHE_DEFAULT_TTL` - default TTL in seconds (default: 300)
    /// - `CACHE_MAX_SIZE` - memory backend entry cap (default: 10000)
    /// - `CACHE_CLEANUP_INTERVAL` - sweep interval in seconds (default: 60)
    /// - `CACHE_FALLBACK_TO_MEMORY` - fall back on connect failure (default: true)
    /// - `CACHE_CONNECT_TIMEOUT_MS` / `CACHE_OP_TIMEOUT_MS` (default: 2000 / 1000)
    /// - `SITEMAP_TTL` - sitemap freshness in seconds (default: 3600)
    /// - `TRANSLATION_MAX_ENTRIES` - translation cache cap (default: 10000)
    /// - `SITE_URL` - public base URL (default: `http://localhost:3000`)
    /// - `CONTENT_DATA_FILE` - JSON fixture for the data source (default: none)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend_defaults = defaults.backend;

        let backend = BackendConfig {
            kind: env::var("CACHE_TYPE")
                .ok()
                .map(|v| BackendKind::parse(&v))
                .unwrap_or(backend_defaults.kind),
            url: env::var("CACHE_URL").ok().filter(|v| !v.is_empty()),
            prefix: env::var("CACHE_PREFIX").unwrap_or(backend_defaults.prefix),
            default_ttl: parse_env("CACHE_DEFAULT_TTL")
                .map(Duration::from_secs)
                .unwrap_or(backend_defaults.default_ttl),
            max_size: parse_env("CACHE_MAX_SIZE").unwrap_or(backend_defaults.max_size),
            cleanup_interval: parse_env("CACHE_CLEANUP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(backend_defaults.cleanup_interval),
            fallback_to_memory: parse_env("CACHE_FALLBACK_TO_MEMORY")
                .unwrap_or(backend_defaults.fallback_to_memory),
            connect_timeout: parse_env("CACHE_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(backend_defaults.connect_timeout),
            op_timeout: parse_env("CACHE_OP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(backend_defaults.op_timeout),
        };

        Self {
            backend,
            sitemap_ttl: parse_env("SITEMAP_TTL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sitemap_ttl),
            translation_max_entries: parse_env("TRANSLATION_MAX_ENTRIES")
                .unwrap_or(defaults.translation_max_entries),
            site_url: env::var("SITE_URL").unwrap_or(defaults.site_url),
            data_file: env::var("CONTENT_DATA_FILE").ok().map(PathBuf::from),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            sitemap_ttl: Duration::from_secs(3_600),
            translation_max_entries: 10_000,
            site_url: "http://localhost:3000".to_string(),
            data_file: None,
            server_port: 3000,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
