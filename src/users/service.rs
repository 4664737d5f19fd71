//! User CRUD on top of the shared store.
//!
//! The collection lives under a single key. Reads fetch the whole collection; every
//! mutation is one atomic store operation, so concurrent workers never overwrite
//! each other's changes.

use super::types::{NewUser, User, UserPatch};
use crate::storage::{SharedStore, StoreError};

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Store key holding the user collection.
pub const USERS_KEY: &str = "users";

pub struct UserService {
    store: Arc<dyn SharedStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        match self.store.get(USERS_KEY).await? {
            Some(users @ Value::Array(_)) => Ok(serde_json::from_value(users)?),
            Some(_) => {
                tracing::warn!("Entry '{}' is not a collection, treating it as empty", USERS_KEY);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.get_all().await?;
        Ok(users.into_iter().find(|user| user.id == id))
    }

    /// Assigns a fresh UUID v4 and appends the user to the collection.
    pub async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = new_user.into_user(Uuid::new_v4());
        self.store
            .append(USERS_KEY, serde_json::to_value(&user)?)
            .await?;

        tracing::debug!("Appended user {} to '{}'", user.id, USERS_KEY);
        Ok(user)
    }

    /// Merges `patch` into the stored user. `None` when no user has this id.
    pub async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let merged = self
            .store
            .merge_by_id(USERS_KEY, &id.to_string(), serde_json::to_value(&patch)?)
            .await?;

        match merged {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns whether a user was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store.remove_by_id(USERS_KEY, &id.to_string()).await
    }
}
