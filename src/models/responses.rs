//! Response DTOs for the admin API

use std::collections::BTreeMap;

use serde::Serialize;

use crate::backend::ManagerInfo;
use crate::cache::CacheStats;
use crate::manager::ManagerStats;

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,
    pub backend: ManagerInfo,
    /// Why the distributed backend failed its ping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(backend: ManagerInfo) -> Self {
        Self {
            status: "healthy".to_string(),
            backend,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn degraded(backend: ManagerInfo, error: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            backend,
            error: Some(error.into()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Statistics per cache name
    pub caches: BTreeMap<String, CacheStats>,
    /// Rollup across every cache, with backend identity
    pub total: ManagerStats,
}

/// Acknowledgement for cache maintenance endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    /// Success message
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_serialization() {
        let json = serde_json::to_value(HealthResponse::healthy(ManagerInfo::memory())).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["backend"]["backend_type"], "memory");
        assert!(json.get("error").is_none());

        let degraded = HealthResponse::degraded(ManagerInfo::memory(), "backend unavailable: refused");
        assert!(!degraded.is_healthy());
        let json = serde_json::to_value(degraded).unwrap();
        assert_eq!(json["status"], "degraded");
    }

    #[test]
    fn test_stats_total_is_flattened() {
        let response = StatsResponse {
            caches: BTreeMap::new(),
            total: ManagerStats {
                totals: CacheStats::from_counts(3, 1, 1, 1),
                info: ManagerInfo::memory(),
            },
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["total"]["hits"], 3);
        assert_eq!(json["total"]["hit_rate"], 75.0);
        assert_eq!(json["total"]["is_fallback"], false);
    }
}
