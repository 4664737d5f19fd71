use super::error::StoreError;
use super::table::SharedTable;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Uniform access to the shared key-value store.
///
/// The same calls work in the primary (`LocalStore`) and in a worker (`RemoteStore`),
/// so request-handling code never needs to know which process it runs in.
#[async_trait]
pub trait SharedStore: Send + Sync + 'static {
    /// Returns the value under `key`, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically pushes `item` onto the collection under `key`.
    async fn append(&self, key: &str, item: Value) -> Result<(), StoreError>;

    /// Atomically merges `patch` into the collection element identified by `id`.
    async fn merge_by_id(&self, key: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError>;

    /// Atomically removes the collection element identified by `id`.
    async fn remove_by_id(&self, key: &str, id: &str) -> Result<bool, StoreError>;
}

/// Store backed directly by the in-process table.
///
/// Used by the primary and by the single-process server.
#[derive(Debug, Clone)]
pub struct LocalStore {
    table: Arc<SharedTable>,
}

impl LocalStore {
    pub fn new(table: Arc<SharedTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl SharedStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.table.get(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.table.set(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.table.delete(key);
        Ok(())
    }

    async fn append(&self, key: &str, item: Value) -> Result<(), StoreError> {
        self.table.append(key, item);
        Ok(())
    }

    async fn merge_by_id(&self, key: &str, id: &str, patch: Value) -> Result<Option<Value>, StoreError> {
        Ok(self.table.merge_by_id(key, id, &patch))
    }

    async fn remove_by_id(&self, key: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self.table.remove_by_id(key, id))
    }
}
