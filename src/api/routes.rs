//! API Routes
//!
//! Configures the Axum router with all cache service endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_default_handler, clear_handler, delete_handler, get_handler, health_handler,
    pending_handler, realign_handler, register_handler, set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a value, optionally tagged
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `GET /invalidations` - List pending invalidations
/// - `POST /invalidations` - Queue an invalidation
/// - `POST /realign` - Run the realign hook
/// - `DELETE /cache` - Clear the default adapter
/// - `DELETE /cache/:adapter` - Clear a named adapter
/// - `GET /health` - Health check endpoint
///
/// The key endpoints accept `?adapter=file|redis`.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route(
            "/invalidations",
            get(pending_handler).post(register_handler),
        )
        .route("/realign", post(realign_handler))
        .route("/cache", delete(clear_default_handler))
        .route("/cache/:adapter", delete(clear_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app(dir: &tempfile::TempDir) -> Router {
        let config = Config {
            directory: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        create_router(AppState::from_config(&config))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_realign_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/realign")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_adapter_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get/key?adapter=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
