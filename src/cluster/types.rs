use anyhow::{Context, Result, bail};
use std::fmt;

/// Environment variable that marks a process as a worker and carries its 1-based ordinal.
pub const WORKER_ENV: &str = "USERS_CLUSTER_WORKER";

/// What this process does, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// One process serving HTTP on the public port with a local store.
    Single,
    /// Owns the store, spawns workers, optionally forwards public connections.
    Primary,
    /// Serves HTTP on `port + ordinal` against the primary's store.
    Worker(usize),
}

impl Role {
    /// Reads the worker marker from the environment; without it, `cluster` picks
    /// between primary and single mode.
    pub fn detect(cluster: bool) -> Result<Self> {
        let marker = std::env::var(WORKER_ENV).ok();
        Self::resolve(marker.as_deref(), cluster)
    }

    pub fn resolve(worker_marker: Option<&str>, cluster: bool) -> Result<Self> {
        match worker_marker {
            Some(raw) => {
                let ordinal: usize = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a worker ordinal, got '{}'", WORKER_ENV, raw))?;
                if ordinal == 0 {
                    bail!("{} is 1-based, got 0", WORKER_ENV);
                }
                Ok(Role::Worker(ordinal))
            }
            None if cluster => Ok(Role::Primary),
            None => Ok(Role::Single),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Single => write!(f, "single"),
            Role::Primary => write!(f, "primary"),
            Role::Worker(ordinal) => write!(f, "worker {}", ordinal),
        }
    }
}

/// Port of the worker with the given ordinal.
pub fn worker_port(base: u16, ordinal: usize) -> Result<u16> {
    u16::try_from(ordinal)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .with_context(|| format!("worker {} has no valid port above base port {}", ordinal, base))
}
