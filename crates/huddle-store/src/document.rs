//! Document bodies and typed encode/decode helpers.

use huddle_common::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::path::DocPath;

/// The body of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A document read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Fields,
}

impl Document {
    pub fn new(path: DocPath, data: Fields) -> Self {
        Self { path, data }
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field)
    }

    /// Decode the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(serde_json::Value::Object(self.data.clone())).map_err(|e| {
            StoreError::Codec(format!("failed to decode {}: {e}", self.path))
        })
    }
}

/// Encode a typed value into a document body. The value must serialize to
/// a JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Codec(format!(
            "document body must be an object, got {other}"
        ))),
    }
}
