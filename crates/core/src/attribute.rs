use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

/// Typed attribute values. Readings arrive as JSON; numbers are kept as `f64`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Number(v as f64)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

/// Attributes of one reading, keyed by dotted path (`sensorData.pressure`).
///
/// Ordered so that iteration (and anything serialized from it) is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet {
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a JSON object into dotted paths.
    ///
    /// Nested objects contribute `parent.child` paths. Nulls and arrays carry
    /// no scalar value and are dropped.
    pub fn from_json(payload: &serde_json::Value) -> Result<Self, CoreError> {
        let object = payload.as_object().ok_or_else(|| {
            CoreError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(payload)
            ))
        })?;

        let mut set = Self::new();
        for (name, value) in object {
            set.flatten_into(name.clone(), value);
        }
        Ok(set)
    }

    fn flatten_into(&mut self, path: String, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(children) => {
                for (name, child) in children {
                    self.flatten_into(format!("{}.{}", path, name), child);
                }
            }
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    self.values.insert(path, AttributeValue::Number(f));
                }
            }
            serde_json::Value::String(s) => {
                self.values.insert(path, AttributeValue::Text(s.clone()));
            }
            serde_json::Value::Bool(b) => {
                self.values.insert(path, AttributeValue::Boolean(*b));
            }
            serde_json::Value::Null | serde_json::Value::Array(_) => {}
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(path.into(), value.into());
    }

    /// Builder-style insert, handy for tests and fixtures.
    pub fn with(mut self, path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn get(&self, path: &str) -> Option<&AttributeValue> {
        self.values.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every path not present in `declared`.
    pub fn retain_declared<S: AsRef<str>>(&mut self, declared: &[S]) {
        self.values
            .retain(|path, _| declared.iter().any(|d| d.as_ref() == path));
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
