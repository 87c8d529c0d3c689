//! Scalar field values held by entities.
//!
//! Comparison follows the identity semantics of the host runtime: immutable
//! scalars compare by variant and value, shared objects compare by reference.

use std::{cell::RefCell, fmt, rc::Rc};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A scalar value stored in an entity field or in recorded original data.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    /// A mutable document shared between holders. Two `Object` values are the
    /// same only when they point at the same allocation.
    Object(SharedObject),
}

/// Reference-counted JSON document with reference identity.
#[derive(Debug, Clone)]
pub struct SharedObject(Rc<RefCell<JsonValue>>);

impl SharedObject {
    pub fn new(value: JsonValue) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn ptr_eq(&self, other: &SharedObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Snapshot of the current document.
    pub fn get(&self) -> JsonValue {
        self.0.borrow().clone()
    }

    /// Mutates the document in place; every holder observes the change.
    pub fn replace(&self, value: JsonValue) -> JsonValue {
        self.0.replace(value)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Strict identity comparison used when diffing scalar fields.
    ///
    /// `Int(1)` and `Float(1.0)` differ, as do `Int(1)` and `Text("1")`.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Comparison used for identifier components of associated entities.
    ///
    /// Non-object components compare by their string form so that `Int(7)` and
    /// `Text("7")` name the same row. Object components never stringify.
    pub fn same_identifier(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Object(_), _) | (_, Value::Object(_)) => false,
            _ => self.to_identifier_string() == other.to_identifier_string(),
        }
    }

    /// String form of a scalar as used for identifier comparison.
    pub fn to_identifier_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::DateTime(value) => value.to_rfc3339(),
            Value::Object(object) => object.get().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a JSON document into a field value. Arrays and maps become
    /// fresh shared objects.
    pub fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(*flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => Value::Text(text.clone()),
            other => Value::Object(SharedObject::new(other.clone())),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Int(value) => JsonValue::from(*value),
            Value::Float(value) => JsonValue::from(*value),
            Value::Text(value) => JsonValue::String(value.clone()),
            Value::DateTime(value) => JsonValue::String(value.to_rfc3339()),
            Value::Object(object) => object.get(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Text(value) => write!(f, "{value:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
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

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<SharedObject> for Value {
    fn from(value: SharedObject) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
