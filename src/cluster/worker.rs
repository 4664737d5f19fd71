use super::types::worker_port;
use crate::config::Config;
use crate::server::serve_http;
use crate::storage::RemoteStore;
use crate::users::{UserService, build_router};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;

/// Worker entry point: HTTP on `port + ordinal`, store calls forwarded to the primary
/// over stdin/stdout. Returns once the primary closes the channel.
pub async fn run(config: &Config, ordinal: usize) -> anyhow::Result<()> {
    serve(config, ordinal)
        .instrument(tracing::info_span!("worker", ordinal))
        .await
}

async fn serve(config: &Config, ordinal: usize) -> anyhow::Result<()> {
    let port = worker_port(config.port, ordinal)?;
    let store = Arc::new(RemoteStore::from_stdio(config.ipc_timeout()));
    let users = Arc::new(UserService::new(store.clone()));

    let addr = SocketAddr::new(config.host, port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("worker {} failed to bind {}", ordinal, addr))?;

    tracing::info!("Worker pid {} listening on {}", std::process::id(), addr);

    let primary = store.clone();
    let primary_gone = async move {
        primary.closed().await;
        tracing::info!("Store channel closed, stopping");
    };

    serve_http(listener, build_router(users), primary_gone)
        .await
        .with_context(|| format!("worker {} HTTP server failed", ordinal))
}
