//! Keyed stateful event detectors.
//!
//! This crate provides:
//! - A small expression language for guards and variable updates
//! - YAML/JSON detector model documents with collected, located validation errors
//! - A filesystem loader for single model files or directories of models
//! - A detector engine keeping one state machine instance per key
//! - A partitioned async pipeline feeding readings in and alerts out

pub mod engine;
pub mod expr;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod validation;

pub use engine::{DetectorEngine, EngineError, Evaluation, InstanceSnapshot};
pub use loader::{parse_model, LoadError, ModelFormat, ModelLoader};
pub use model::DetectorModel;
pub use pipeline::{Pipeline, PipelineError, PipelineStats};
pub use validation::{validate_document, ValidationErrors, ValidationResult};
