//! HTTP error taxonomy for the user API.
//!
//! Every handler error ends up here and is rendered as `{status, message}`.
//! Internal failures are logged server-side and replaced by a generic message.

use crate::storage::StoreError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid User ID or format")]
    InvalidId,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid request body: malformed JSON")]
    MalformedBody,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("User not found")]
    UserNotFound,

    #[error("Endpoint not found. URL does not exist")]
    EndpointNotFound,

    #[error("Store unavailable")]
    StoreUnavailable(#[source] StoreError),

    #[error("Internal Server Error")]
    Internal(anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidId | ApiError::Validation(_) | ApiError::MalformedBody => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UserNotFound | ApiError::EndpointNotFound => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            ApiError::StoreUnavailable(err)
        } else {
            ApiError::Internal(err.into())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(err) => tracing::error!("Unhandled error: {:#}", err),
            ApiError::StoreUnavailable(err) => tracing::warn!("Store unavailable: {}", err),
            _ => tracing::debug!("Request rejected: {}", self),
        }

        let status = self.status();
        let body = ErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
