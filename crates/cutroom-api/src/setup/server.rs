//! Server startup and graceful shutdown

use crate::state::AppState;
use anyhow::Result;
use axum::Router;
use cutroom_core::Config;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the configured port and serve until SIGINT or SIGTERM.
pub async fn start_server(config: &Config, state: Arc<AppState>, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(
        max_video_mb = config.max_video_size_bytes() / 1024 / 1024,
        cache_budget_mb = config.cache_budget_bytes() / 1024 / 1024,
        video_extensions = %config.video_allowed_extensions().join(","),
        upload_root = %config.upload_root().display(),
        proxy_dir = %config.proxy_dir().display(),
        max_concurrent_transcodes = config.max_concurrent_transcodes(),
        max_concurrent_probes = config.max_concurrent_probes(),
        "Server ready and accepting connections"
    );

    serve(listener, app, state, shutdown_signal()).await
}

/// Serve `app` until `shutdown` resolves and in-flight requests drain.
///
/// The cache state is logged once the last request has finished, then the
/// subscriber is flushed.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    let stats = state.store.stats().await;
    tracing::info!(
        entries = stats.entry_count,
        total_bytes = stats.total_bytes,
        budget_bytes = stats.budget_bytes,
        "Server stopped"
    );
    cutroom_infra::shutdown_telemetry().await;

    served?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, draining requests"),
        _ = terminate => tracing::info!("Received SIGTERM, draining requests"),
    }
}
