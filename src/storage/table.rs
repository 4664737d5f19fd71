//! Authoritative in-memory table held by the primary process.

use super::protocol::{StoreRequest, StoreResponse};

use dashmap::DashMap;
use serde_json::Value;

/// Name of the field used to identify elements inside collection entries.
const ID_FIELD: &str = "id";

/// The single authoritative copy of every shared entry.
///
/// Every method runs synchronously and holds the `DashMap` shard lock for the
/// touched key only while it mutates, so each call is atomic with respect to
/// other callers on the same key.
#[derive(Debug, Default)]
pub struct SharedTable {
    entries: DashMap<String, Value>,
}

impl SharedTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    /// Removes `key`. Missing keys are ignored.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Pushes `item` onto the array stored under `key`.
    ///
    /// A missing entry, or one that is not an array, is replaced by a fresh array.
    pub fn append(&self, key: &str, item: Value) {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        match entry.value_mut() {
            Value::Array(items) => items.push(item),
            other => {
                tracing::warn!("Entry '{}' was not a collection, resetting it", key);
                *other = Value::Array(vec![item]);
            }
        }
    }

    /// Merges the fields of `patch` into the element of `key` whose `id` matches.
    ///
    /// The `id` field itself is never overwritten. Returns the merged element, or
    /// `None` when there is no such element or `patch` is not an object.
    pub fn merge_by_id(&self, key: &str, id: &str, patch: &Value) -> Option<Value> {
        let Some(fields) = patch.as_object() else {
            tracing::warn!("Ignoring non-object patch for '{}' element {}", key, id);
            return None;
        };

        let mut entry = self.entries.get_mut(key)?;
        let items = entry.value_mut().as_array_mut()?;
        let target = items
            .iter_mut()
            .find(|item| has_id(item, id))?
            .as_object_mut()?;

        for (field, value) in fields {
            if field != ID_FIELD {
                target.insert(field.clone(), value.clone());
            }
        }

        Some(Value::Object(target.clone()))
    }

    /// Removes the element of `key` whose `id` matches. Returns whether one was removed.
    pub fn remove_by_id(&self, key: &str, id: &str) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(items) = entry.value_mut().as_array_mut() else {
            return false;
        };

        match items.iter().position(|item| has_id(item, id)) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies one protocol request and produces the matching response.
    pub fn apply(&self, request: StoreRequest) -> StoreResponse {
        match request {
            StoreRequest::Get { key } => StoreResponse::Value {
                value: self.get(&key),
            },
            StoreRequest::Set { key, value } => {
                self.set(&key, value);
                StoreResponse::Ack
            }
            StoreRequest::Delete { key } => {
                self.delete(&key);
                StoreResponse::Ack
            }
            StoreRequest::Append { key, item } => {
                self.append(&key, item);
                StoreResponse::Ack
            }
            StoreRequest::MergeById { key, id, patch } => StoreResponse::Merged {
                item: self.merge_by_id(&key, &id, &patch),
            },
            StoreRequest::RemoveById { key, id } => StoreResponse::Removed {
                found: self.remove_by_id(&key, &id),
            },
        }
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    item.get(ID_FIELD).and_then(Value::as_str) == Some(id)
}
