//! JSON payload encoding for queue messages.
//!
//! Messages are JSON objects on the wire, so any producer or consumer that
//! speaks JSON can share a queue with this crate.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{RabbitMQError, Result};

/// A mapping payload as published and fetched by the client.
pub type Payload = serde_json::Map<String, Value>;

pub const CONTENT_TYPE: &str = "application/json";

/// Encode `data` as a JSON object. Anything that does not serialize to an
/// object is rejected.
pub fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(data)?;
    if !value.is_object() {
        return Err(RabbitMQError::InvalidPayload(value_kind(&value)));
    }
    Ok(serde_json::to_vec(&value)?)
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| RabbitMQError::DeserializationError(e.to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
