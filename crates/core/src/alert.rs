use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a rendered alert message should be interpreted by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadFormat {
    #[default]
    String,
    Json,
}

/// A notification produced by a detector, ready for the sink.
///
/// Carries everything the sink needs to route and describe the alert; the
/// engine never sees whether delivery succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Name of the detector model that fired.
    pub detector_model: String,
    /// Instance key (e.g. a device id).
    pub key: String,
    /// State the instance was in when the action ran.
    pub state: String,
    /// Name of the event rule whose action fired.
    pub event_name: String,
    /// Routing target chosen by the model (topic, channel group, ...).
    pub target: String,
    /// Variable store of the instance at the time the action ran.
    pub variables: BTreeMap<String, f64>,
    /// Rendered payload template, when the model defines one.
    pub message: Option<String>,
    #[serde(default)]
    pub format: PayloadFormat,
}

impl Alert {
    /// Short human-readable summary, used when no template is configured.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} for '{}' in state {}",
            self.detector_model, self.event_name, self.key, self.state
        )
    }
}
