use std::time::Duration;
use thiserror::Error;

/// Failures of the shared store.
///
/// `Unavailable` and `Timeout` mean the primary could not be reached; callers should
/// surface them as a temporary outage rather than as a bug.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True when the primary is unreachable (closed channel or expired wait).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}
