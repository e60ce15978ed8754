//! Error types for the caching subsystem
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::source::SourceError;

// == Cache Error Enum ==
/// Unified error type for every cache, backend and domain cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired. An expected outcome, not a failure.
    #[error("cache miss")]
    Miss,

    /// Operation attempted after the cache or backend was closed
    #[error("cache is closed")]
    Closed,

    /// Networked backend could not be reached or failed mid-call
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Value could not be encoded or decoded
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// Backend call exceeded its deadline
    #[error("backend operation timed out")]
    Timeout,

    /// Error raised by the authoritative data source, passed through unmodified
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for the expected "absent" outcome.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::BackendUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Miss => StatusCode::NOT_FOUND,
            CacheError::Closed | CacheError::BackendUnavailable(_) | CacheError::Timeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Source(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (CacheError::Miss, StatusCode::NOT_FOUND),
            (CacheError::Closed, StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                CacheError::InvalidRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::Source(SourceError::Unavailable("db down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_source_error_is_transparent() {
        let err = CacheError::from(SourceError::Unavailable("db down".to_string()));
        assert_eq!(err.to_string(), SourceError::Unavailable("db down".to_string()).to_string());
        assert!(!err.is_miss());
        assert!(CacheError::Miss.is_miss());
    }
}
