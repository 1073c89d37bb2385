//! API Handlers
//!
//! HTTP request handlers exposing the adapters, the invalidation queue and
//! the realign hook to a host.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::cache::{AdapterKind, AdapterRegistry, CacheBackend};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::invalidation::{realign, InvalidationQueue, InvalidationRecord};
use crate::models::{
    requests::validate_key, AdapterQuery, ClearResponse, DeleteResponse, GetResponse,
    HealthResponse, PendingResponse, RealignResponse, RegisterRequest, RegisterResponse,
    SetRequest, SetResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Adapter handles
    pub registry: Arc<AdapterRegistry>,
    /// Deferred invalidations stored in the default adapter
    pub queue: InvalidationQueue,
}

impl AppState {
    /// Creates a new AppState around an existing registry.
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        let queue = InvalidationQueue::new(Arc::clone(&registry));
        Self { registry, queue }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(AdapterRegistry::new(config.clone())))
    }

    async fn adapter(&self, kind: Option<AdapterKind>) -> Result<Arc<dyn CacheBackend>> {
        self.registry
            .adapter(kind.unwrap_or(self.registry.default_kind()))
            .await
    }
}

fn parse_adapter(query: &AdapterQuery) -> Result<Option<AdapterKind>> {
    query.adapter.as_deref().map(str::parse::<AdapterKind>).transpose()
}

/// Handler for PUT /set
///
/// Stores a value, tagged when the request carries tags.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let kind = req.validate()?;
    let adapter = state.adapter(kind).await?;

    if req.tags.is_empty() {
        adapter.set(&req.key, &req.value).await?;
    } else {
        let tagged = adapter
            .tag_aware()
            .ok_or_else(|| CacheError::TagsUnsupported(adapter.kind().to_string()))?;
        tagged.set_tagged(&req.key, &req.value, &req.tags).await?;
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<AdapterQuery>,
) -> Result<Json<GetResponse>> {
    validate_key(&key)?;
    let adapter = state.adapter(parse_adapter(&query)?).await?;
    let value = adapter
        .get(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<AdapterQuery>,
) -> Result<Json<DeleteResponse>> {
    validate_key(&key)?;
    let adapter = state.adapter(parse_adapter(&query)?).await?;
    adapter.delete_keys(std::slice::from_ref(&key)).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /invalidations
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let adapter = req.validate()?;
    let identity = InvalidationRecord::new(req.kind, req.keys.clone(), adapter).identity();
    let queued = state.queue.register(req.kind, req.keys, adapter).await?;

    Ok(Json(RegisterResponse { queued, identity }))
}

/// Handler for GET /invalidations
pub async fn pending_handler(State(state): State<AppState>) -> Result<Json<PendingResponse>> {
    let records = state.queue.pending().await?;
    Ok(Json(PendingResponse::new(records)))
}

/// Handler for POST /realign
pub async fn realign_handler(State(state): State<AppState>) -> Result<Json<RealignResponse>> {
    let outcome = realign(&state.queue).await?;
    info!(?outcome, "Realign requested over HTTP");
    Ok(Json(RealignResponse::new(outcome)))
}

/// Handler for DELETE /cache
pub async fn clear_default_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.registry.clear(None).await?;
    Ok(Json(ClearResponse::new(state.registry.default_kind().as_str())))
}

/// Handler for DELETE /cache/:adapter
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.registry.clear(Some(adapter.as_str())).await?;
    Ok(Json(ClearResponse::new(adapter)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.registry.default_kind().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalidation::{InvalidationType, QUEUE_KEY};

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            directory: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        (dir, AppState::from_config(&config))
    }

    fn set_request(key: &str, value: &str, tags: &[&str]) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: value.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            adapter: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (_dir, state) = test_state();

        let result = set_handler(State(state.clone()), Json(set_request("k", "v", &[]))).await;
        assert!(result.is_ok());

        let response = get_handler(
            State(state),
            Path("k".to_string()),
            Query(AdapterQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.value, "v");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (_dir, state) = test_state();

        let result = get_handler(
            State(state),
            Path("nonexistent".to_string()),
            Query(AdapterQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_rejects_reserved_key() {
        let (_dir, state) = test_state();
        state
            .queue
            .register_keys(vec!["a".to_string()], None)
            .await
            .unwrap();

        let result = get_handler(
            State(state),
            Path(QUEUE_KEY.to_string()),
            Query(AdapterQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (_dir, state) = test_state();
        set_handler(State(state.clone()), Json(set_request("gone", "v", &[])))
            .await
            .unwrap();

        delete_handler(
            State(state.clone()),
            Path("gone".to_string()),
            Query(AdapterQuery::default()),
        )
        .await
        .unwrap();

        let result = get_handler(
            State(state),
            Path("gone".to_string()),
            Query(AdapterQuery::default()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_register_and_realign() {
        let (_dir, state) = test_state();
        set_handler(
            State(state.clone()),
            Json(set_request("p1", "v", &["products"])),
        )
        .await
        .unwrap();

        let req = RegisterRequest {
            kind: InvalidationType::Tag,
            keys: vec!["products".to_string()],
            adapter: None,
        };
        let response = register_handler(State(state.clone()), Json(req.clone()))
            .await
            .unwrap();
        assert!(response.queued);
        assert_eq!(response.identity, r#"tag["products"]"#);

        let again = register_handler(State(state.clone()), Json(req)).await.unwrap();
        assert!(!again.queued);

        let pending = pending_handler(State(state.clone())).await.unwrap();
        assert_eq!(pending.count, 1);

        realign_handler(State(state.clone())).await.unwrap();

        let pending = pending_handler(State(state.clone())).await.unwrap();
        assert_eq!(pending.count, 0);
        let result = get_handler(
            State(state),
            Path("p1".to_string()),
            Query(AdapterQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_unknown_adapter() {
        let (_dir, state) = test_state();
        let result = clear_handler(State(state), Path("bogus".to_string())).await;
        assert!(matches!(result, Err(CacheError::UnknownAdapter(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (_dir, state) = test_state();
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.default_adapter, "file");
    }
}
