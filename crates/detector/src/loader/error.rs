//! Error types and load result structures for the model loader.

use std::path::PathBuf;

use crate::validation::ValidationErrors;

/// Errors that can occur while loading a detector model.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error, or a document that does not match the model schema.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model parsed but failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The file extension is not one of `yml`, `yaml`, `json`.
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// Two files define a model with the same name.
    #[error("duplicate model name '{name}' (already loaded from {})", .first.display())]
    Duplicate { name: String, first: PathBuf },

    /// The configured model path does not exist.
    #[error("model path not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Outcome of loading a single model file.
#[derive(Debug)]
pub struct LoadResult {
    /// Path to the file that was loaded.
    pub path: PathBuf,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// Model was parsed, validated, and stored.
    Loaded { model: String },
    /// File was skipped (dotfile, unsupported extension).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}
