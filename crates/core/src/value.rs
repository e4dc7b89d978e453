//! Store-neutral scalar values.
//!
//! `Value` is what flows between predicates, mutation payloads and result rows. Both the
//! Postgres adapter and the in-memory store speak it, so nothing above the store boundary
//! needs to know which one is in use.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::CoreError;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(JsonValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
        }
    }

    /// SQL comparison: `None` when either side is null or the types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Json(a), Value::Json(b)) => (a == b).then_some(Ordering::Equal),
            _ => None,
        }
    }

    /// Hashable identity of the value, used for grouping and de-duplication.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Uuid(u) => ValueKey::Uuid(*u),
            Value::Timestamp(t) => ValueKey::Timestamp(*t),
            Value::Json(j) => ValueKey::Json(j.to_string()),
        }
    }

    /// Plain JSON rendering (no type tags), used when decoding records through serde.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
            Value::Json(j) => j.clone(),
        }
    }
}

/// Hashable, totally ordered projection of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(String),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Decoding of a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CoreError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(CoreError::decode("bool", other.type_name())),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(CoreError::decode("int", other.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(CoreError::decode("float", other.type_name())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(CoreError::decode("text", other.type_name())),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            other => Err(CoreError::decode("uuid", other.type_name())),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            other => Err(CoreError::decode("timestamp", other.type_name())),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            other => Err(CoreError::decode("json", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CoreError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
