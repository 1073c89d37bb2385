//! Realign Cache - pluggable cache adapters with deferred invalidation
//!
//! Runs the HTTP surface through which a host registers invalidations and
//! triggers realignment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realign_cache::api::create_router;
use realign_cache::{spawn_realign_task, AppState, Config};

/// Main entry point for the cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration (settings file when `CACHE_SETTINGS_PATH` is set, then environment)
/// 3. Build the adapter registry and invalidation queue
/// 4. Start the periodic realign task when an interval is configured
/// 5. Serve the HTTP API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realign_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Realign Cache service");

    let config = match std::env::var("CACHE_SETTINGS_PATH") {
        Ok(path) => Config::from_file_and_env(&PathBuf::from(&path))
            .with_context(|| format!("loading cache settings from {path}"))?,
        Err(_) => Config::from_env(),
    };
    info!(
        default_adapter = %config.default_adapter,
        namespace = %config.effective_namespace(),
        realign_mode = ?config.realign_mode,
        untagged_policy = ?config.untagged_policy,
        port = config.server_port,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config);

    // Fail fast when the default adapter cannot be built
    state
        .registry
        .get_adapter(None)
        .await
        .context("initializing default cache adapter")?;
    info!("Default cache adapter ready");

    let realign_handle = (config.realign_interval > 0)
        .then(|| spawn_realign_task(state.queue.clone(), config.realign_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(realign_handle))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the realign task and allows graceful shutdown.
async fn shutdown_signal(realign_handle: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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

    if let Some(handle) = realign_handle {
        handle.abort();
        warn!("Realign task aborted");
    }
}
