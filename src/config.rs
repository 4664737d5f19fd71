//! Process configuration.
//!
//! Every setting can come from the command line or from the environment. Worker
//! processes inherit both from the primary, so they resolve the same values.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_IPC_TIMEOUT_MS: u64 = 5000;

/// How long the forwarding listener waits for a worker to accept a connection.
pub const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "users-cluster")]
#[command(about = "CRUD user API, optionally served by a cluster of worker processes")]
pub struct Config {
    /// Public port; in cluster mode workers listen on `port + ordinal`
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address every listener binds to
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Run a primary process plus worker processes instead of a single server
    #[arg(long, env = "CLUSTER")]
    pub cluster: bool,

    /// Number of worker processes (defaults to one less than the CPU count)
    #[arg(long, env = "WORKERS", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Accept connections on the public port and forward them to the workers
    #[arg(
        long,
        env = "BALANCER",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub balancer: bool,

    /// Upper bound, in milliseconds, on a worker's wait for a store reply
    #[arg(
        long,
        env = "IPC_TIMEOUT_MS",
        default_value_t = DEFAULT_IPC_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub ipc_timeout_ms: u64,
}

impl Config {
    /// Reads the command line and the environment. Invalid values end the process
    /// with a usage error.
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .map(usize::from)
            .unwrap_or_else(default_worker_count)
    }

    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms)
    }

    pub fn public_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// One worker per CPU, keeping one for the primary, never fewer than one.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);

    cpus.saturating_sub(1).max(1)
}
