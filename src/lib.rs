//! Users Cluster Library
//!
//! A CRUD HTTP API for user records that runs either as a single process or as a
//! primary process with worker processes sharing one in-memory store.
//!
//! ## Architecture Modules
//! - **`users`**: The HTTP surface. Router, handlers, validation and `UserService`.
//! - **`storage`**: The shared key-value store. `SharedTable` lives in the primary;
//!   workers reach it through `RemoteStore` over a framed request/reply channel.
//! - **`cluster`**: Process roles, worker spawning and the round-robin forwarding
//!   listener.
//! - **`config`**: Command-line and environment settings.
//! - **`server`**: HTTP serving shared by single mode and workers.

pub mod cluster;
pub mod config;
pub mod server;
pub mod storage;
pub mod users;
