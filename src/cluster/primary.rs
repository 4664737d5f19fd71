use super::balancer::Balancer;
use super::types::{WORKER_ENV, worker_port};
use crate::config::{Config, UPSTREAM_CONNECT_TIMEOUT};
use crate::server::shutdown_signal;
use crate::storage::{SharedTable, serve_channel};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::task::JoinSet;

/// Primary entry point: owns the table, spawns the workers, serves their store
/// channels and forwards public connections until Ctrl+C.
pub async fn run(config: &Config) -> Result<()> {
    let table = Arc::new(SharedTable::new());
    let count = config.worker_count();
    let mut tasks = JoinSet::new();

    // Bind first so a busy public port fails startup before any worker exists.
    let listener = if config.balancer {
        let addr = config.public_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        Some(listener)
    } else {
        None
    };

    tracing::info!("Primary pid {} starting {} workers", std::process::id(), count);

    let mut upstreams = Vec::with_capacity(count);
    for ordinal in 1..=count {
        let port = worker_port(config.port, ordinal)?;
        spawn_worker(ordinal, table.clone(), &mut tasks)
            .with_context(|| format!("failed to start worker {}", ordinal))?;
        upstreams.push(SocketAddr::new(config.host, port));
    }

    if let Some(listener) = listener {
        let balancer = Arc::new(Balancer::new(upstreams, UPSTREAM_CONNECT_TIMEOUT));
        tasks.spawn(async move {
            if let Err(e) = balancer.run(listener).await {
                tracing::error!("Forwarding listener stopped: {}", e);
            }
        });
    } else {
        tracing::info!("Forwarding listener disabled, workers serve {:?}", upstreams);
    }

    shutdown_signal().await;

    // Dropping the exit observers drops their `Child` handles, which kills the workers.
    tasks.shutdown().await;
    tracing::info!("Primary stopped, {} entries in store", table.len());
    Ok(())
}

fn spawn_worker(ordinal: usize, table: Arc<SharedTable>, tasks: &mut JoinSet<()>) -> Result<()> {
    let exe = std::env::current_exe().context("cannot locate the current executable")?;

    let mut child = Command::new(exe)
        .args(std::env::args_os().skip(1))
        .env(WORKER_ENV, ordinal.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let to_worker = child.stdin.take().context("worker stdin is not piped")?;
    let from_worker = child.stdout.take().context("worker stdout is not piped")?;

    let pid = child.id().context("worker exited before reporting its pid")?;
    tracing::info!("Worker {} started with pid {}", ordinal, pid);

    tasks.spawn(async move {
        if let Err(e) = serve_channel(from_worker, to_worker, table, ordinal).await {
            tracing::error!("Store channel for worker {} failed: {}", ordinal, e);
        }
    });
    tasks.spawn(observe_exit(ordinal, pid, child));

    Ok(())
}

/// Waits for a worker to exit and logs how it ended. Workers are not restarted.
async fn observe_exit(ordinal: usize, pid: u32, mut child: Child) {
    match child.wait().await {
        Ok(status) => tracing::warn!(
            "Worker {} (pid {}) exited: code {:?}, signal {:?}",
            ordinal,
            pid,
            status.code(),
            exit_signal(&status)
        ),
        Err(e) => tracing::error!("Lost track of worker {} (pid {}): {}", ordinal, pid, e),
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
