//! SQL values crossing the protocol boundary.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single SQL value.
///
/// Integers are 64-bit; blobs are reference-counted byte buffers so result
/// rows can be cloned cheaply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integer { value: i64 },
    Float { value: f64 },
    Text { value: String },
    Blob { value: Bytes },
}

impl Value {
    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer { .. } => "integer",
            Value::Float { .. } => "float",
            Value::Text { .. } => "text",
            Value::Blob { .. } => "blob",
        }
    }

    /// Returns the integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer { value } => Some(*value),
            _ => None,
        }
    }

    /// Returns the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text { value } => Some(value),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer { value }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float { value }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text {
            value: value.to_string(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text { value }
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob {
            value: Bytes::from(value),
        }
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Blob { value }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
