//! JSON record adapter.
//!
//! Records are `serde_json::Value` objects whose hierarchy fields are named by
//! `CollectionSettings`. Field reads follow loose-object semantics: a missing
//! field (or a record that is not an object) reads as `Undefined`, which is
//! falsy and equals only another `Undefined`.

use std::fmt;

use serde_json::Value;

use crate::domain::accessor::RecordAccessor;
use crate::domain::settings::CollectionSettings;

/// Identifier value compared with strict equality.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonKey {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Object or array: never equal to anything, itself included.
    Opaque,
}

impl JsonKey {
    pub fn from_field(value: Option<&Value>) -> Self {
        match value {
            None => JsonKey::Undefined,
            Some(Value::Null) => JsonKey::Null,
            Some(Value::Bool(b)) => JsonKey::Bool(*b),
            Some(Value::Number(n)) => n.as_f64().map_or(JsonKey::Opaque, JsonKey::Number),
            Some(Value::String(s)) => JsonKey::String(s.clone()),
            Some(Value::Array(_)) | Some(Value::Object(_)) => JsonKey::Opaque,
        }
    }

    /// Strict equality against a raw field value, without materializing a key.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (JsonKey::Undefined, None) => true,
            (JsonKey::Null, Some(Value::Null)) => true,
            (JsonKey::Bool(a), Some(Value::Bool(b))) => a == b,
            (JsonKey::Number(a), Some(Value::Number(b))) => b.as_f64() == Some(*a),
            (JsonKey::String(a), Some(Value::String(b))) => a == b,
            _ => false,
        }
    }

    pub fn strict_eq(&self, other: &JsonKey) -> bool {
        match (self, other) {
            (JsonKey::Undefined, JsonKey::Undefined) | (JsonKey::Null, JsonKey::Null) => true,
            (JsonKey::Bool(a), JsonKey::Bool(b)) => a == b,
            (JsonKey::Number(a), JsonKey::Number(b)) => a == b,
            (JsonKey::String(a), JsonKey::String(b)) => a == b,
            _ => false,
        }
    }

    /// Group under strict equality; `None` for keys that equal nothing.
    pub fn group(&self) -> Option<KeyGroup> {
        match self {
            JsonKey::Undefined => Some(KeyGroup::Undefined),
            JsonKey::Null => Some(KeyGroup::Null),
            JsonKey::Bool(b) => Some(KeyGroup::Bool(*b)),
            JsonKey::Number(n) if n.is_nan() => None,
            JsonKey::Number(n) if *n == 0.0 => Some(KeyGroup::Number(0.0f64.to_bits())),
            JsonKey::Number(n) => Some(KeyGroup::Number(n.to_bits())),
            JsonKey::String(s) => Some(KeyGroup::String(s.clone())),
            JsonKey::Opaque => None,
        }
    }
}

/// Hashable image of a `JsonKey` under strict equality.
///
/// Numbers are stored as normalized `f64` bits so `0` and `-0` share a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyGroup {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(String),
}

impl fmt::Display for JsonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonKey::Undefined => f.write_str("undefined"),
            JsonKey::Null => f.write_str("null"),
            JsonKey::Bool(b) => write!(f, "{}", b),
            JsonKey::Number(n) => write!(f, "{}", n),
            JsonKey::String(s) => write!(f, "{:?}", s),
            JsonKey::Opaque => f.write_str("<object>"),
        }
    }
}

/// Truthiness of an optional JSON value: `null`, `false`, `0`, `""` and
/// missing fields are falsy; everything else, empty containers included, is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// `RecordAccessor` over JSON objects, derived once from `CollectionSettings`.
#[derive(Debug, Clone)]
pub struct JsonAccessor {
    settings: CollectionSettings,
}

impl JsonAccessor {
    pub fn new(settings: CollectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    /// Raw parent field of a record.
    pub fn parent_field<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        record.get(&self.settings.parent_property)
    }
}

impl From<&CollectionSettings> for JsonAccessor {
    fn from(settings: &CollectionSettings) -> Self {
        Self::new(settings.clone())
    }
}

impl RecordAccessor<Value> for JsonAccessor {
    type Key = JsonKey;
    type Group = KeyGroup;

    fn root_key(&self) -> JsonKey {
        JsonKey::Null
    }

    fn identifier(&self, record: &Value) -> JsonKey {
        JsonKey::from_field(record.get(&self.settings.id_property))
    }

    fn is_branch(&self, record: &Value) -> bool {
        is_truthy(record.get(&self.settings.node_property))
    }

    fn has_parent(&self, record: &Value, key: &JsonKey) -> bool {
        key.matches(self.parent_field(record))
    }

    fn group(&self, key: &JsonKey) -> Option<KeyGroup> {
        key.group()
    }

    fn parent_group(&self, record: &Value) -> Option<KeyGroup> {
        JsonKey::from_field(self.parent_field(record)).group()
    }

    fn describe(&self, key: &JsonKey) -> String {
        key.to_string()
    }
}
