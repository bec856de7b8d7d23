use serde::{Deserialize, Serialize};

use super::StateDefinition;

/// How rules inside one group see each other's variable writes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationMethod {
    /// Each write is visible to the rules after it.
    #[default]
    Serial,
    /// Every rule in a group sees the variables as they were when the group
    /// started; writes land after the group finishes.
    Batch,
}

impl std::fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMethod::Serial => f.write_str("SERIAL"),
            EvaluationMethod::Batch => f.write_str("BATCH"),
        }
    }
}

/// Declared input schema: only these attribute paths reach the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputDefinition {
    pub input_name: String,
    #[serde(default)]
    pub attributes: Vec<InputAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputAttribute {
    pub json_path: String,
}

impl InputDefinition {
    pub fn paths(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.json_path.as_str()).collect()
    }
}

/// States plus the initial state name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectorModelDefinition {
    pub states: Vec<StateDefinition>,
    pub initial_state_name: String,
}

/// A complete model file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectorModelDocument {
    #[serde(default)]
    pub detector_model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_model_description: Option<String>,
    /// Attribute path holding the instance key, e.g. `motorid`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub evaluation_method: EvaluationMethod,
    #[serde(default)]
    pub input: Option<InputDefinition>,
    pub detector_model_definition: DetectorModelDefinition,
}

impl DetectorModelDocument {
    /// Wrap a bare definition with defaults for everything else.
    pub fn from_definition(definition: DetectorModelDefinition) -> Self {
        Self {
            detector_model_name: None,
            detector_model_description: None,
            key: None,
            evaluation_method: EvaluationMethod::default(),
            input: None,
            detector_model_definition: definition,
        }
    }

    /// Parse a full document or a bare definition from a JSON value.
    ///
    /// A value with `detectorModelDefinition` is a full document; anything
    /// else is read as a bare `{ states, initialStateName }` definition.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("detectorModelDefinition").is_some() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value::<DetectorModelDefinition>(value).map(Self::from_definition)
        }
    }
}
