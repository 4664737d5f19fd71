use super::error::ApiError;
use super::service::UserService;
use super::types::{NewUser, User, UserPatch};

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use uuid::fmt::Hyphenated;

pub async fn handle_list_users(
    Extension(users): Extension<Arc<UserService>>,
) -> Result<Json<Vec<User>>, ApiError> {
    let all = users.get_all().await?;
    tracing::debug!("Listing {} users", all.len());
    Ok(Json(all))
}

pub async fn handle_create_user(
    Extension(users): Extension<Arc<UserService>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let new_user = NewUser::from_json(&parse_body(body)?)?;
    let user = users.create(new_user).await?;

    tracing::info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn handle_get_user(
    Extension(users): Extension<Arc<UserService>>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_user_id(&id)?;

    match users.get_by_id(id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::UserNotFound),
    }
}

pub async fn handle_update_user(
    Extension(users): Extension<Arc<UserService>>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<User>, ApiError> {
    let id = parse_user_id(&id)?;
    let patch = UserPatch::from_json(&parse_body(body)?)?;

    match users.update(id, patch).await? {
        Some(user) => {
            tracing::info!("Updated user {}", user.id);
            Ok(Json(user))
        }
        None => Err(ApiError::UserNotFound),
    }
}

pub async fn handle_delete_user(
    Extension(users): Extension<Arc<UserService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_user_id(&id)?;

    if users.delete(id).await? {
        tracing::info!("Deleted user {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::UserNotFound)
    }
}

/// Always fails; lets clients verify the 500 path end to end.
pub async fn handle_failure_probe() -> Result<StatusCode, ApiError> {
    Err(ApiError::Internal(anyhow::anyhow!("Test error")))
}

pub async fn handle_not_found() -> ApiError {
    ApiError::EndpointNotFound
}

/// Accepts only the hyphenated form (`8-4-4-4-12` hex digits).
fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    if raw.len() != Hyphenated::LENGTH {
        return Err(ApiError::InvalidId);
    }
    Uuid::try_parse(raw).map_err(|_| ApiError::InvalidId)
}

fn parse_body(body: Result<Bytes, BytesRejection>) -> Result<Value, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            tracing::debug!("Could not read request body: {}", rejection);
            ApiError::MalformedBody
        }
    })?;

    serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejecting malformed body: {}", e);
        ApiError::MalformedBody
    })
}
