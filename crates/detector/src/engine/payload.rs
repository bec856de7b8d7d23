//! Rendering of notify payload templates.
//!
//! Templates are per-action strings, so a fresh [`minijinja::Environment`]
//! is created per render call.

use serde::Serialize;
use tripwire_core::{AttributeSet, PayloadFormat};

use crate::expr::Variables;
use crate::model::Payload;

/// What a payload template can see.
#[derive(Debug, Serialize)]
pub(crate) struct PayloadContext<'a> {
    pub detector_model: &'a str,
    pub key: &'a str,
    pub state: &'a str,
    pub event_name: &'a str,
    pub target: &'a str,
    pub variables: &'a Variables,
    /// Attributes of the reading being processed, by dotted path.
    pub input: &'a AttributeSet,
}

/// Render `payload`, or `None` (with a warning) if rendering fails.
pub(crate) fn render(payload: &Payload, ctx: &PayloadContext<'_>) -> Option<String> {
    let env = minijinja::Environment::new();
    let rendered = match env.render_str(&payload.template, ctx) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(
                model = ctx.detector_model,
                key = ctx.key,
                event = ctx.event_name,
                error = %e,
                "payload template failed to render"
            );
            return None;
        }
    };

    if payload.format == PayloadFormat::Json
        && serde_json::from_str::<serde_json::Value>(&rendered).is_err()
    {
        tracing::warn!(
            model = ctx.detector_model,
            key = ctx.key,
            event = ctx.event_name,
            "JSON payload did not render to valid JSON"
        );
    }
    Some(rendered)
}
