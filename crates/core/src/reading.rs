use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeSet, AttributeValue};
use crate::error::CoreError;

/// One incoming telemetry reading bound to a detector instance key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub key: String,
    pub attributes: AttributeSet,
}

impl Reading {
    pub fn new(key: impl Into<String>, attributes: AttributeSet) -> Self {
        Self {
            key: key.into(),
            attributes,
        }
    }

    /// Build a reading from a raw JSON payload, taking the key from the
    /// attribute at `key_path` (numbers and booleans are stringified).
    pub fn from_payload(key_path: &str, payload: &serde_json::Value) -> Result<Self, CoreError> {
        let attributes = AttributeSet::from_json(payload)?;
        let key = match attributes.get(key_path) {
            Some(AttributeValue::Text(s)) if !s.is_empty() => s.clone(),
            Some(AttributeValue::Number(n)) => format_number_key(*n),
            Some(AttributeValue::Boolean(b)) => b.to_string(),
            _ => return Err(CoreError::MissingKey(key_path.to_string())),
        };
        Ok(Self { key, attributes })
    }
}

/// `42.0` becomes `"42"`, non-integral numbers keep their fraction.
fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
