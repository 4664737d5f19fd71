//! Process Topology Module
//!
//! Runs the users API as one primary process plus N worker processes on one machine.
//!
//! ## Core Concepts
//! - **Roles**: A process is a worker when `USERS_CLUSTER_WORKER` carries its ordinal;
//!   otherwise it is the primary (cluster mode) or a single server.
//! - **Primary**: Re-executes the current binary once per worker, with the worker's stdin
//!   and stdout as its store channel. It owns the `SharedTable` and logs worker exits.
//! - **Workers**: Serve HTTP on `port + ordinal` with a `RemoteStore`, and stop when the
//!   primary goes away.
//! - **Forwarding listener**: `Balancer` accepts on the public port and relays each
//!   connection to one worker, round-robin.

pub mod balancer;
pub mod primary;
pub mod types;
pub mod worker;

pub use balancer::Balancer;
pub use types::{Role, WORKER_ENV, worker_port};
