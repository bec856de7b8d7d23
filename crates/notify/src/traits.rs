//! Notifier trait definition and shared error types.

use std::collections::HashMap;

use tripwire_core::Alert;

use crate::templating::TemplateContext;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Routing metadata (detector model, key, state, event, target).
    pub metadata: HashMap<String, String>,
    /// Data exposed to channel-level templates.
    #[serde(skip)]
    pub context: TemplateContext,
}

impl Notification {
    /// Build a notification from a detector alert.
    ///
    /// The body is the alert's rendered message when the model defines a
    /// payload template; otherwise it is the alert itself as pretty JSON.
    pub fn from_alert(alert: &Alert, now: String) -> Self {
        let body = match &alert.message {
            Some(message) => message.clone(),
            None => serde_json::to_string_pretty(alert).unwrap_or_else(|_| alert.summary()),
        };

        let metadata = HashMap::from([
            ("detector_model".to_string(), alert.detector_model.clone()),
            ("key".to_string(), alert.key.clone()),
            ("state".to_string(), alert.state.clone()),
            ("event_name".to_string(), alert.event_name.clone()),
            ("target".to_string(), alert.target.clone()),
        ]);

        Self {
            subject: alert.summary(),
            body,
            metadata,
            context: TemplateContext {
                alert: alert.clone(),
                now,
            },
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub key: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tripwire_core::PayloadFormat;

    fn alert(message: Option<&str>) -> Alert {
        Alert {
            detector_model: "MotorDetectorModel".to_string(),
            key: "Fulton-A32".to_string(),
            state: "Dangerous".to_string(),
            event_name: "Pressure Threshold Breached".to_string(),
            target: "pressure-alerts".to_string(),
            variables: BTreeMap::from([("pressureThresholdBreached".to_string(), 3.0)]),
            message: message.map(str::to_string),
            format: PayloadFormat::String,
        }
    }

    #[test]
    fn body_uses_rendered_message_when_present() {
        let n = Notification::from_alert(&alert(Some("motor over pressure")), "now".into());
        assert_eq!(n.body, "motor over pressure");
        assert_eq!(n.metadata["key"], "Fulton-A32");
        assert_eq!(n.metadata["target"], "pressure-alerts");
    }

    #[test]
    fn body_falls_back_to_alert_json() {
        let n = Notification::from_alert(&alert(None), "now".into());
        let parsed: serde_json::Value = serde_json::from_str(&n.body).unwrap();
        assert_eq!(parsed["state"], "Dangerous");
        assert_eq!(parsed["variables"]["pressureThresholdBreached"], 3.0);
        assert!(n.subject.contains("Pressure Threshold Breached"));
    }
}
