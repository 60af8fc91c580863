//! Result shapes handed back to callers.
//!
//! Reads return the entity itself. Writes return [`Created`] or [`Deleted`].
//! Failures become an object carrying only an `error` string, so callers
//! detect failure by the presence of that field.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::{GENERIC_FAILURE, RepoError, RepoResult};

/// Acknowledged insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    #[serde(serialize_with = "serialize_hex")]
    pub new_object_id: ObjectId,
    pub message: String,
}

/// Confirmed single-document delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&RepoError> for ErrorBody {
    fn from(err: &RepoError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

fn serialize_hex<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_hex())
}

/// Turns an operation result into the JSON a caller receives.
pub fn shape_result<T: Serialize>(result: &RepoResult<T>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|err| {
            tracing::error!("Failed to encode repository result: {}", err);
            json!({ "error": GENERIC_FAILURE })
        }),
        Err(err) => json!({ "error": err.to_string() }),
    }
}
