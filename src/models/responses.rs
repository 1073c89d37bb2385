//! Response DTOs for the cache service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::invalidation::{InvalidationRecord, RealignOutcome};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /invalidations
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    /// False when an identical instruction was already pending
    pub queued: bool,
    pub identity: String,
}

/// Response body for GET /invalidations
#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    pub count: usize,
    pub records: Vec<InvalidationRecord>,
}

impl PendingResponse {
    pub fn new(records: Vec<InvalidationRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

/// Response body for POST /realign
#[derive(Debug, Clone, Serialize)]
pub struct RealignResponse {
    pub outcome: RealignOutcome,
    pub timestamp: String,
}

impl RealignResponse {
    pub fn new(outcome: RealignOutcome) -> Self {
        Self {
            outcome,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for DELETE /cache[/:adapter]
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub adapter: String,
}

impl ClearResponse {
    pub fn new(adapter: impl Into<String>) -> Self {
        let adapter = adapter.into();
        Self {
            message: format!("Adapter '{}' cleared", adapter),
            adapter,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Adapter used when none is named
    pub default_adapter: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(default_adapter: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            default_adapter: default_adapter.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
