//! Error types for the cache adapters and invalidation queue
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for adapter resolution, backend I/O and queue handling.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend collaborator missing or misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Adapter name outside the supported set
    #[error("Unrecognized cache adapter: {0}")]
    UnknownAdapter(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem failure in the file backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store failure
    #[cfg(feature = "redis-backend")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The reserved queue entry does not hold a mapping
    #[error("Corrupt invalidation queue: {0}")]
    CorruptQueue(String),

    /// Tag invalidation requested on a backend without tag support
    #[error("Adapter '{0}' does not support tag invalidation")]
    TagsUnsupported(String),

    /// Compare-and-swap kept losing against concurrent writers
    #[error("Invalidation queue update lost {0} consecutive races")]
    QueueContention(usize),

    /// Some queued records could not be applied; the queue was still drained
    #[error("{failed} of {total} invalidation records failed")]
    InvalidationFailed { failed: usize, total: usize },
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::UnknownAdapter(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::TagsUnsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::QueueContention(_) => StatusCode::CONFLICT,
            CacheError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::UnknownAdapter("x".into()), StatusCode::BAD_REQUEST),
            (
                CacheError::Configuration("no redis".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::InvalidationFailed { failed: 1, total: 2 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_invalidation_failed_message() {
        let err = CacheError::InvalidationFailed { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 invalidation records failed");
    }
}
