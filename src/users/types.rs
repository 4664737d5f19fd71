use super::error::ApiError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Message returned when a create body lacks one of the required fields.
pub const CREATE_BODY_MESSAGE: &str = "Invalid request body: username, age, and hobbies are required";

/// Message returned when an update body carries a field of the wrong type.
pub const UPDATE_BODY_MESSAGE: &str =
    "Invalid request body: username must be a string, age a non-negative integer, and hobbies an array of strings";

/// A stored user record.
///
/// `id` is assigned once, at creation, by the process that performs the create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub age: u32,
    pub hobbies: Vec<String>,
}

/// Validated body of a create request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub age: u32,
    pub hobbies: Vec<String>,
}

impl NewUser {
    /// Checks presence and type of every required field.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let invalid = || ApiError::Validation(CREATE_BODY_MESSAGE.to_string());
        let fields = body.as_object().ok_or_else(invalid)?;

        let username = string_field(fields, "username")
            .ok_or_else(invalid)?
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?;
        let age = age_field(fields).ok_or_else(invalid)?.ok_or_else(invalid)?;
        let hobbies = hobbies_field(fields).ok_or_else(invalid)?.ok_or_else(invalid)?;

        Ok(Self {
            username,
            age,
            hobbies,
        })
    }

    pub fn into_user(self, id: Uuid) -> User {
        User {
            id,
            username: self.username,
            age: self.age,
            hobbies: self.hobbies,
        }
    }
}

/// Validated body of an update request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobbies: Option<Vec<String>>,
}

impl UserPatch {
    /// Accepts any subset of the user fields; `null` counts as absent and unknown
    /// fields (including `id`) are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let invalid = || ApiError::Validation(UPDATE_BODY_MESSAGE.to_string());
        let fields = body.as_object().ok_or_else(invalid)?;

        Ok(Self {
            username: string_field(fields, "username").ok_or_else(invalid)?,
            age: age_field(fields).ok_or_else(invalid)?,
            hobbies: hobbies_field(fields).ok_or_else(invalid)?,
        })
    }
}

// Field readers: the outer `Option` is `None` on a type mismatch, the inner one on absence.

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(value)) => Some(Some(value.clone())),
        Some(_) => None,
    }
}

fn age_field(fields: &Map<String, Value>) -> Option<Option<u32>> {
    match fields.get("age") {
        None | Some(Value::Null) => Some(None),
        Some(value) => value
            .as_u64()
            .and_then(|age| u32::try_from(age).ok())
            .map(Some),
    }
}

fn hobbies_field(fields: &Map<String, Value>) -> Option<Option<Vec<String>>> {
    match fields.get("hobbies") {
        None | Some(Value::Null) => Some(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some),
        Some(_) => None,
    }
}
