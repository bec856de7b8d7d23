//! Alert webhook: POSTs every alert to an HTTP endpoint.
//!
//! Without a `body_template` the request body is an alert document:
//!
//! ```json
//! {
//!   "detectorModel": "MotorDetectorModel",
//!   "key": "Fulton-A32",
//!   "state": "Dangerous",
//!   "eventName": "Pressure Threshold Breached",
//!   "target": "pressure-alerts",
//!   "variables": { "pressureThresholdBreached": 3.0 },
//!   "message": "Motor Fulton-A32 is over pressure",
//!   "dispatchedAt": "2026-02-16T12:00:00+00:00"
//! }
//! ```
//!
//! A model payload of type `JSON` is embedded as a JSON value rather than a
//! string. `${NAME}` references in the URL and header values are expanded
//! from the environment once, when the channel is built.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use tripwire_core::PayloadFormat;

use crate::templating::{TemplateContext, TemplateRenderer};
use crate::traits::{Notification, Notifier, NotifyError};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertDocument<'a> {
    detector_model: &'a str,
    key: &'a str,
    state: &'a str,
    event_name: &'a str,
    target: &'a str,
    variables: &'a BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<serde_json::Value>,
    dispatched_at: &'a str,
}

impl<'a> AlertDocument<'a> {
    fn new(context: &'a TemplateContext) -> Self {
        let alert = &context.alert;
        let message = alert.message.as_deref().map(|m| match alert.format {
            // A JSON payload that failed to render as JSON still goes out, as text.
            PayloadFormat::Json => serde_json::from_str(m)
                .unwrap_or_else(|_| serde_json::Value::String(m.to_string())),
            PayloadFormat::String => serde_json::Value::String(m.to_string()),
        });
        Self {
            detector_model: &alert.detector_model,
            key: &alert.key,
            state: &alert.state,
            event_name: &alert.event_name,
            target: &alert.target,
            variables: &alert.variables,
            message,
            dispatched_at: &context.now,
        }
    }
}

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    headers: HeaderMap,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(
        url: &str,
        headers: &HashMap<String, String>,
        body_template: Option<String>,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let url = expand_env(url)?;

        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NotifyError::Config(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(&expand_env(value)?)
                .map_err(|_| NotifyError::Config(format!("invalid value for header '{name}'")))?;
            header_map.insert(header, value);
        }

        if let Some(template) = &body_template {
            renderer
                .validate(template)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        Ok(Self {
            url,
            headers: header_map,
            body_template,
            renderer,
            client: reqwest::Client::new(),
        })
    }

    /// Request body and its content type for one notification.
    fn body(&self, notification: &Notification) -> Result<(String, &'static str), NotifyError> {
        match &self.body_template {
            Some(template) => {
                let body = self.renderer.render(template, &notification.context)?;
                let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                    JSON
                } else {
                    TEXT
                };
                Ok((body, content_type))
            }
            None => {
                let body = serde_json::to_string(&AlertDocument::new(&notification.context))
                    .map_err(|e| NotifyError::Config(format!("cannot encode alert: {e}")))?;
                Ok((body, JSON))
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (body, content_type) = self.body(notification)?;
        let alert = &notification.context.alert;

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        if let Err(e) = response.error_for_status_ref() {
            tracing::warn!(
                channel = "webhook",
                key = %alert.key,
                alert_target = %alert.target,
                status = %response.status(),
                "webhook rejected alert"
            );
            return Err(e.into());
        }

        tracing::debug!(channel = "webhook", key = %alert.key, status = %response.status(), "alert posted");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace each `${NAME}` with the value of environment variable `NAME`.
fn expand_env(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| NotifyError::Config(format!("unclosed '${{' in '{input}'")))?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("environment variable '{name}' is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
