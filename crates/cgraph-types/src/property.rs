//! Serialized node property values.
//!
//! Property maps never hold null. Removing a property is an explicit
//! [`PropertyWrite::Unset`] instruction, and a JSON `null` arriving from an
//! event payload is translated into that instruction.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// A raw property value: the closed set of simple data types that may be
/// persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl PropertyValue {
    /// Short name of the variant, used in logs and debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl TryFrom<Value> for PropertyValue {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(TypeError::NullPropertyValue),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => Ok(Self::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(items) => Ok(Self::Array(items)),
            Value::Object(map) => Ok(Self::Object(map)),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A property value together with the declared property type, as stored in
/// the event log and in the node `properties` column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedPropertyValue {
    pub value: PropertyValue,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl SerializedPropertyValue {
    pub fn new(value: impl Into<PropertyValue>, type_name: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            type_name: type_name.into(),
        }
    }

    /// Build a write instruction from a raw JSON value.
    ///
    /// A JSON `null` yields [`PropertyWrite::Unset`] instead of a value.
    pub fn create(value: Value, type_name: impl Into<String>) -> PropertyWrite {
        match PropertyValue::try_from(value) {
            Ok(value) => PropertyWrite::Set(Self {
                value,
                type_name: type_name.into(),
            }),
            Err(_) => PropertyWrite::Unset,
        }
    }
}

/// Instruction for one property in a property update.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyWrite {
    Set(SerializedPropertyValue),
    Unset,
}

impl PropertyWrite {
    pub fn set(value: impl Into<PropertyValue>, type_name: impl Into<String>) -> Self {
        Self::Set(SerializedPropertyValue::new(value, type_name))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

#[derive(Deserialize)]
struct RawPropertyWrite {
    #[serde(default)]
    value: Value,
    #[serde(rename = "type")]
    type_name: String,
}

impl Serialize for PropertyWrite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyWrite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<RawPropertyWrite> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(raw) => SerializedPropertyValue::create(raw.value, raw.type_name),
            None => Self::Unset,
        })
    }
}

/// The property map of one node record, ordered by property name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedPropertyValues(BTreeMap<String, SerializedPropertyValue>);

impl SerializedPropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a property map from write instructions; unset entries are
    /// dropped.
    pub fn from_writes<'a>(writes: impl IntoIterator<Item = (&'a String, &'a PropertyWrite)>) -> Self {
        let mut values = Self::new();
        values.merge(writes);
        values
    }

    pub fn get(&self, name: &str) -> Option<&SerializedPropertyValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SerializedPropertyValue)> {
        self.0.iter()
    }

    /// Apply one write instruction. Returns `true` if the map changed.
    pub fn apply(&mut self, name: &str, write: &PropertyWrite) -> bool {
        match write {
            PropertyWrite::Set(value) => {
                let previous = self.0.insert(name.to_string(), value.clone());
                previous.as_ref() != Some(value)
            }
            PropertyWrite::Unset => self.0.remove(name).is_some(),
        }
    }

    /// Apply a batch of write instructions. Returns `true` if anything changed.
    pub fn merge<'a>(
        &mut self,
        writes: impl IntoIterator<Item = (&'a String, &'a PropertyWrite)>,
    ) -> bool {
        let mut changed = false;
        for (name, write) in writes {
            changed |= self.apply(name, write);
        }
        changed
    }

    /// The JSON text payload of the `properties` column.
    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string(&self.0).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
