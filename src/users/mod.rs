//! User API Module
//!
//! The CRUD HTTP surface for user records.
//!
//! ## Submodules
//! - **`types`**: The `User` record and validated request bodies.
//! - **`service`**: `UserService`, CRUD over the shared store's `"users"` collection.
//! - **`handlers`**: Axum handlers mapping HTTP requests to service calls.
//! - **`error`**: `ApiError`, the status-code taxonomy and `{status, message}` body.
//! - **`router`**: Route table plus CORS, panic recovery and trailing-slash handling.

pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod types;

pub use error::{ApiError, ErrorBody};
pub use router::{App, build_router};
pub use service::UserService;
pub use types::{NewUser, User, UserPatch};
