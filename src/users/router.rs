use super::error::ApiError;
use super::handlers::*;
use super::service::UserService;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Extension, Router};
use std::any::Any;
use std::sync::Arc;
use tower::Layer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

pub const ENDPOINT_USERS: &str = "/api/users";
pub const ENDPOINT_USER: &str = "/api/users/:id";
/// Deliberately failing route used to exercise the 500 path.
pub const ENDPOINT_FAILURE_PROBE: &str = "/api/users/error";

/// Largest accepted request body; bigger bodies get a 413.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The full HTTP application: routes, CORS, panic recovery, tracing and trailing-slash
/// normalization.
pub type App = NormalizePath<Router>;

pub fn build_router(users: Arc<UserService>) -> App {
    let router = Router::new()
        .route(
            ENDPOINT_USERS,
            get(handle_list_users)
                .post(handle_create_user)
                .fallback(handle_not_found),
        )
        .route(ENDPOINT_FAILURE_PROBE, any(handle_failure_probe))
        .route(
            ENDPOINT_USER,
            get(handle_get_user)
                .put(handle_update_user)
                .delete(handle_delete_user)
                .fallback(handle_not_found),
        )
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(users));

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Adds the CORS headers to every response and answers `OPTIONS` directly.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::Internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}
