//! The per-entity field dictionary stored under an [`EntityKey`].
//!
//! [`EntityKey`]: crate::cache::key::EntityKey

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named fields of a single entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldDictionary(Map<String, Value>);

/// The stored value is not a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct NotADictionary(pub Value);

/// The field exists and is not an array.
#[derive(Debug, Clone, PartialEq)]
pub struct NotASequence(pub Value);

impl FieldDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret a raw store value. `None` stays absent.
    pub fn from_stored(raw: Option<Value>) -> Result<Option<Self>, NotADictionary> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Self(map))),
            Some(other) => Err(NotADictionary(other)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Set `field`, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Push `value` onto the array held in `field`, creating it if needed.
    ///
    /// A missing or null field becomes a one-element array.
    pub fn append(&mut self, field: &str, value: Value) -> Result<usize, NotASequence> {
        match self.0.get_mut(field) {
            Some(Value::Array(items)) => {
                items.push(value);
                Ok(items.len())
            }
            Some(Value::Null) | None => {
                self.0.insert(field.to_string(), Value::Array(vec![value]));
                Ok(1)
            }
            Some(other) => Err(NotASequence(other.clone())),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for FieldDictionary {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Whether `value` counts as "nothing there" for a stored handler.
///
/// Null, false, zero, `""`, `"0"` and empty containers are all blank.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
