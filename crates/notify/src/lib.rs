//! Notification sink for detector alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Log, webhook, and email notifier implementations
//! - Minijinja template rendering for channel-level templates
//! - Channel configuration (YAML) and a dispatcher that routes alerts by target

pub mod config;
pub mod dispatcher;
pub mod email;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use config::{ChannelConfig, ChannelType, ChannelsConfig};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use traits::{Notification, Notifier, NotifyError};
