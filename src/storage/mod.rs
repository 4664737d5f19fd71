//! Shared Key-Value Store
//!
//! A process-wide mapping from string keys to JSON values, reachable through the
//! same async API from the primary process and from every worker process.
//!
//! ## Core Concepts
//! - **Authority**: The primary owns the only `SharedTable`. Workers never cache entries.
//! - **Access**: `SharedStore` is implemented by `LocalStore` (direct table access) and
//!   `RemoteStore` (framed requests sent to the primary over the worker's IPC channel).
//! - **Atomic mutations**: Collection edits (`append`, `merge_by_id`, `remove_by_id`) travel as
//!   single messages and are applied by the primary under the entry lock, so concurrent
//!   workers cannot lose each other's updates.
//! - **Correlation**: Every request that expects a reply carries a request id; replies are
//!   routed back to the waiting caller by that id and bounded by a timeout.

pub mod error;
pub mod protocol;
pub mod remote;
pub mod server;
pub mod store;
pub mod table;

pub use error::StoreError;
pub use remote::RemoteStore;
pub use server::serve_channel;
pub use store::{LocalStore, SharedStore};
pub use table::SharedTable;

#[cfg(test)]
mod tests;
