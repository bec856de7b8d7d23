use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub detector: DetectorConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TRIPWIRE_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TRIPWIRE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            detector: DetectorConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  detector:    models={}, partitions={}, queue={}",
            self.detector.models_path.display(),
            self.detector.partitions,
            self.detector.queue_capacity
        );
        tracing::info!(
            "  notify:      channels={}, queue={}",
            self.notify
                .channels_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(log only)".to_string()),
            self.notify.queue_capacity
        );
    }
}

// ── Detector ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// A single model file or a directory of model files.
    pub models_path: PathBuf,
    /// Number of evaluation partitions (readings are routed by key hash).
    pub partitions: usize,
    /// Bounded queue size per partition.
    pub queue_capacity: usize,
}

impl DetectorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            models_path: PathBuf::from(profiled_env_or(p, "MODELS_PATH", "data/models")),
            partitions: profiled_env_usize(p, "DETECTOR_PARTITIONS", 4),
            queue_capacity: profiled_env_usize(p, "DETECTOR_QUEUE_CAPACITY", 1024),
        }
    }
}

// ── Notification sink ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// YAML file with per-target channel definitions. `None` = log channel only.
    pub channels_path: Option<PathBuf>,
    /// Bounded queue between evaluation and dispatch.
    pub queue_capacity: usize,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            channels_path: profiled_env_opt(p, "CHANNELS_PATH").map(PathBuf::from),
            queue_capacity: profiled_env_usize(p, "DISPATCH_QUEUE_CAPACITY", 1024),
        }
    }
}
