//! Channel configuration: which channels receive alerts for which target.
//!
//! ```yaml
//! default:
//!   - channel: log
//! targets:
//!   pressure-alerts:
//!     - channel: email
//!       smtp_host: smtp.example.com
//!       smtp_port: 587
//!       from: alerts@example.com
//!       to: [ops@example.com]
//!     - channel: webhook
//!       url: https://hooks.example.com/${HOOK_TOKEN}
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::email::EmailNotifier;
use crate::log::LogNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Top-level channel config document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelsConfig {
    /// Channels for targets without their own entry. Absent = log channel.
    #[serde(default)]
    pub default: Option<Vec<ChannelConfig>>,
    /// Target name (the model's notify target) → channels.
    #[serde(default)]
    pub targets: HashMap<String, Vec<ChannelConfig>>,
}

/// A single notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub channel: ChannelType,
    // Log fields
    #[serde(default)]
    pub verbose: Option<bool>,
    // Webhook fields
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body_template: Option<String>,
    // Email fields
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub tls: Option<bool>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<Vec<String>>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Notification channel types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Log,
    Webhook,
    Email,
}

impl ChannelsConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, NotifyError> {
        serde_yaml::from_str(contents)
            .map_err(|e| NotifyError::Config(format!("invalid channel config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, NotifyError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Check required fields per channel type. Returns one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(default) = &self.default {
            for (i, channel) in default.iter().enumerate() {
                channel.validate(&format!("default[{i}]"), &mut problems);
            }
        }
        for (target, channels) in &self.targets {
            for (i, channel) in channels.iter().enumerate() {
                channel.validate(&format!("targets.{target}[{i}]"), &mut problems);
            }
        }
        problems
    }
}

impl ChannelConfig {
    /// A plain log channel.
    pub fn log() -> Self {
        Self {
            channel: ChannelType::Log,
            verbose: None,
            url: None,
            headers: None,
            body_template: None,
            smtp_host: None,
            smtp_port: None,
            tls: None,
            from: None,
            to: None,
            subject: None,
        }
    }

    fn validate(&self, path: &str, problems: &mut Vec<String>) {
        match self.channel {
            ChannelType::Log => {}
            ChannelType::Webhook => match &self.url {
                None => problems.push(format!("{path}.url: webhook channel requires 'url'")),
                Some(url)
                    if !url.starts_with("http://")
                        && !url.starts_with("https://")
                        && !url.starts_with("${") =>
                {
                    problems.push(format!(
                        "{path}.url: URL must start with http:// or https://, got '{url}'"
                    ));
                }
                Some(_) => {}
            },
            ChannelType::Email => {
                if self.smtp_host.is_none() {
                    problems.push(format!("{path}.smtp_host: email channel requires 'smtp_host'"));
                }
                if self.from.is_none() {
                    problems.push(format!("{path}.from: email channel requires 'from'"));
                }
                if self.to.as_ref().map_or(true, |to| to.is_empty()) {
                    problems.push(format!("{path}.to: email channel requires at least one recipient"));
                }
            }
        }
    }

    /// Construct the notifier for this channel.
    pub fn build(&self, renderer: &Arc<TemplateRenderer>) -> Result<Box<dyn Notifier>, NotifyError> {
        match self.channel {
            ChannelType::Log => Ok(Box::new(LogNotifier::new(self.verbose.unwrap_or(false)))),
            ChannelType::Webhook => {
                let url = self
                    .url
                    .clone()
                    .ok_or_else(|| NotifyError::Config("webhook channel requires 'url'".into()))?;
                Ok(Box::new(WebhookNotifier::new(
                    &url,
                    &self.headers.clone().unwrap_or_default(),
                    self.body_template.clone(),
                    Arc::clone(renderer),
                )?))
            }
            ChannelType::Email => {
                let smtp_host = self.smtp_host.as_deref().ok_or_else(|| {
                    NotifyError::Config("email channel requires 'smtp_host'".into())
                })?;
                let from = self
                    .from
                    .as_deref()
                    .ok_or_else(|| NotifyError::Config("email channel requires 'from'".into()))?;
                Ok(Box::new(EmailNotifier::from_config(
                    smtp_host,
                    self.smtp_port,
                    self.tls,
                    from,
                    self.to.as_deref().unwrap_or(&[]),
                    self.subject.clone(),
                    Arc::clone(renderer),
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
targets:
  pressure-alerts:
    - channel: log
      verbose: true
    - channel: webhook
      url: https://hooks.example.com/motor
      headers:
        X-Source: tripwire
    - channel: email
      smtp_host: smtp.example.com
      smtp_port: 587
      from: alerts@example.com
      to: [ops@example.com]
      subject: "{{ alert.state }}: {{ alert.key }}"
"#;

    #[test]
    fn parse_sample_config() {
        let config = ChannelsConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.default.is_none());
        let channels = &config.targets["pressure-alerts"];
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].channel, ChannelType::Log);
        assert_eq!(channels[1].headers.as_ref().unwrap()["X-Source"], "tripwire");
        assert_eq!(channels[2].to.as_ref().unwrap(), &vec!["ops@example.com".to_string()]);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn build_every_channel_type() {
        let config = ChannelsConfig::from_yaml_str(SAMPLE).unwrap();
        let renderer = Arc::new(TemplateRenderer::new());
        let names: Vec<String> = config.targets["pressure-alerts"]
            .iter()
            .map(|c| c.build(&renderer).unwrap().channel_name().to_string())
            .collect();
        assert_eq!(names, vec!["log", "webhook", "email"]);
    }

    #[test]
    fn validate_reports_missing_fields() {
        let config = ChannelsConfig::from_yaml_str(
            r#"
default:
  - channel: webhook
    url: ftp://nope
targets:
  t:
    - channel: email
"#,
        )
        .unwrap();
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.starts_with("default[0].url")));
        assert!(problems.iter().any(|p| p.starts_with("targets.t[0].smtp_host")));
        assert!(problems.iter().any(|p| p.starts_with("targets.t[0].from")));
        assert!(problems.iter().any(|p| p.starts_with("targets.t[0].to")));
    }

    #[test]
    fn unknown_channel_type_is_rejected() {
        let err = ChannelsConfig::from_yaml_str("default:\n  - channel: pager\n").unwrap_err();
        assert!(err.to_string().contains("invalid channel config"));
    }
}
