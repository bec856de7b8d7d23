//! Serde types for detector model documents (YAML or JSON).
//!
//! Defines the raw, unvalidated shape of a model file:
//! - `DetectorModelDocument`: name, key attribute, evaluation method, input schema
//! - `DetectorModelDefinition`: states and the initial state name
//! - `StateDefinition`: `onInput` / `onEnter` / `onExit` rule groups
//! - `ActionDefinition`: `setVariable` and `sns` (alias `notify`)
//!
//! Expressions are kept as strings here; `validation` parses them.

mod action;
mod document;
mod state;

pub use action::*;
pub use document::*;
pub use state::*;

use serde::{Deserialize, Deserializer};

/// Accept an expression written as a YAML/JSON scalar of any kind.
///
/// `condition: true` and `value: 0` are common in hand-written YAML and
/// arrive as booleans and numbers rather than strings.
pub(crate) fn expression_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected an expression string, got {other}"
        ))),
    }
}

pub(crate) fn default_condition() -> String {
    "true".to_string()
}

#[cfg(test)]
mod tests;
