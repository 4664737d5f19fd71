//! HTTP serving shared by single mode and cluster workers.

use crate::config::Config;
use crate::storage::{LocalStore, SharedTable};
use crate::users::{App, UserService, build_router};

use anyhow::Context;
use axum::extract::Request;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves `app` on `listener` until `shutdown` completes.
pub async fn serve_http<F>(listener: TcpListener, app: App, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let service = axum::ServiceExt::<Request>::into_make_service(app);
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Single mode: one process, a local store and HTTP on the public port.
pub async fn run_single(config: &Config) -> anyhow::Result<()> {
    let table = Arc::new(SharedTable::new());
    let users = Arc::new(UserService::new(Arc::new(LocalStore::new(table))));

    let addr = config.public_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    serve_http(listener, build_router(users), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Completes on Ctrl+C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
