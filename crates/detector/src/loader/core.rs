//! Core [`ModelLoader`] struct: filesystem-backed model loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::model::DetectorModel;
use crate::schema::DetectorModelDocument;
use crate::validation::validate_document;

use super::error::{LoadError, LoadResult, LoadStatus, Result};

/// Supported model file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Yaml,
    Json,
}

impl ModelFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yml" | "yaml" => Some(ModelFormat::Yaml),
            "json" => Some(ModelFormat::Json),
            _ => None,
        }
    }
}

/// Parse and validate model text.
///
/// `default_name` names the model when the document does not.
pub fn parse_model(contents: &str, format: ModelFormat, default_name: &str) -> Result<DetectorModel> {
    let value: serde_json::Value = match format {
        ModelFormat::Yaml => serde_yaml::from_str(contents)?,
        ModelFormat::Json => serde_json::from_str(contents)?,
    };
    let mut doc = DetectorModelDocument::from_value(value)?;
    if doc.detector_model_name.is_none() {
        doc.detector_model_name = Some(default_name.to_string());
    }
    Ok(validate_document(&doc)?)
}

/// Filesystem-backed model loader.
///
/// `path` is either a single model file or a directory scanned recursively
/// for `*.yml` / `*.yaml` / `*.json`. Loaded models are kept by name.
pub struct ModelLoader {
    path: PathBuf,
    models: RwLock<BTreeMap<String, (PathBuf, Arc<DetectorModel>)>>,
}

impl ModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            models: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load every model under the configured path.
    ///
    /// Dotfiles and unsupported extensions are skipped; parse and validation
    /// errors are reported per file and do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        if !self.path.exists() {
            return Err(LoadError::NotFound(self.path.clone()));
        }
        let mut results = Vec::new();
        if self.path.is_file() {
            let path = self.path.clone();
            let status = self.load_and_store(&path);
            results.push(LoadResult { path, status });
        } else {
            self.scan_dir_recursive(&self.path, &mut results)?;
        }
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Stable load order, so duplicate-name conflicts resolve the same way every run.
        entries.sort();

        for path in entries {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if ModelFormat::from_path(&path).is_none() {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML or JSON file".to_string(),
                    },
                });
                continue;
            }

            let status = self.load_and_store(&path);
            results.push(LoadResult { path, status });
        }

        Ok(())
    }

    fn load_and_store(&self, path: &Path) -> LoadStatus {
        match self.load_file(path).and_then(|model| self.insert(path, model)) {
            Ok(model) => {
                info!(model = %model.name(), states = model.states().len(), path = %path.display(), "loaded detector model");
                LoadStatus::Loaded {
                    model: model.name().to_string(),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load detector model");
                LoadStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn insert(&self, path: &Path, model: DetectorModel) -> Result<Arc<DetectorModel>> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((first, _)) = models.get(model.name()) {
            return Err(LoadError::Duplicate {
                name: model.name().to_string(),
                first: first.clone(),
            });
        }
        let model = Arc::new(model);
        models.insert(model.name().to_string(), (path.to_path_buf(), Arc::clone(&model)));
        Ok(model)
    }

    /// Parse and validate a single file without storing it.
    ///
    /// The file stem names the model when the document does not.
    pub fn load_file(&self, path: &Path) -> Result<DetectorModel> {
        let format = ModelFormat::from_path(path)
            .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;
        let contents = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("detector");
        parse_model(&contents, format, stem)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A loaded model by name.
    pub fn get(&self, name: &str) -> Option<Arc<DetectorModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|(_, m)| Arc::clone(m))
    }

    /// All loaded models, ordered by name.
    pub fn models(&self) -> Vec<Arc<DetectorModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|(_, m)| Arc::clone(m))
            .collect()
    }
}
