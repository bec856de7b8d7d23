//! Model validation with structured errors and suggestions.
//!
//! Turns a raw [`DetectorModelDocument`] into an immutable [`DetectorModel`].
//! Every problem is collected rather than stopping at the first one, each with
//! a JSON-path-like location (`states[1].onInput.transitionEvents[0].nextState`)
//! and, for misspelled names, a "did you mean" suggestion.
//! Warnings are advisory and never block a model.

mod compile;
mod expressions;

pub(crate) mod fuzzy;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::DetectorModel;
use crate::schema::{DetectorModelDefinition, DetectorModelDocument};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"states[0].onEnter.events[0].condition"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "{}: {}", self.path, self.message)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{suggestion}'?)")?;
        }
        Ok(())
    }
}

/// Every error found in a rejected model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid detector model: {}", join_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Whether any error is reported at exactly `path`.
    pub fn has_error_at(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Check a document without building a model. Reports errors and warnings.
pub fn check_document(doc: &DetectorModelDocument) -> ValidationResult {
    compile::compile(doc).1
}

/// Validate a full document and build the model it describes.
///
/// Warnings are logged; errors reject the model.
pub fn validate_document(doc: &DetectorModelDocument) -> Result<DetectorModel, ValidationErrors> {
    let (model, result) = compile::compile(doc);
    for warning in &result.warnings {
        tracing::warn!(path = %warning.path, "{}", warning.message);
    }
    match model {
        Some(model) if result.valid => Ok(model),
        _ => Err(ValidationErrors {
            errors: result.errors,
        }),
    }
}

/// Validate a bare `{ states, initialStateName }` definition with default
/// document settings (SERIAL evaluation, no declared input, no key).
pub fn validate(definition: &DetectorModelDefinition) -> Result<DetectorModel, ValidationErrors> {
    validate_document(&DetectorModelDocument::from_definition(definition.clone()))
}
