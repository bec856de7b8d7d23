//! Filesystem model loader.
//!
//! Reads detector model documents (YAML or JSON) from a single file or a
//! directory tree, validates them, and keeps the resulting models by name.
//! Models are loaded once; there is no hot reload.

mod core;
mod error;


pub use self::core::{parse_model, ModelFormat, ModelLoader};
pub use self::error::{LoadError, LoadResult, LoadStatus, Result};
