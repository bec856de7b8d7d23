//! Routes detector alerts to configured channels.
//!
//! The dispatcher receives an alert and delivers it to all channels
//! configured for the alert's target. Individual channel failures don't
//! block other channels, and nothing is reported back to the engine.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tripwire_core::Alert;

use crate::config::{ChannelConfig, ChannelsConfig};
use crate::templating::TemplateRenderer;
use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};

/// Dispatches notifications to multiple channels, organized per target.
pub struct Dispatcher {
    /// Target → list of notifier channels for that target.
    target_channels: HashMap<String, Vec<Box<dyn Notifier>>>,
    /// Fallback channels used when no target-specific channels exist.
    default_channels: Vec<Box<dyn Notifier>>,
}

/// Running totals from [`Dispatcher::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub alerts: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self {
            target_channels: HashMap::new(),
            default_channels: Vec::new(),
        }
    }

    /// Create a simple dispatcher with channels shared across all targets.
    pub fn with_defaults(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            target_channels: HashMap::new(),
            default_channels: channels,
        }
    }

    /// Build every channel described by `config`.
    ///
    /// When the config has no `default` section, alerts for unknown targets
    /// go to a log channel.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, NotifyError> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(NotifyError::Config(problems.join("; ")));
        }

        let renderer = Arc::new(TemplateRenderer::new());
        let build_all = |channels: &[ChannelConfig]| {
            channels
                .iter()
                .map(|c| c.build(&renderer))
                .collect::<Result<Vec<_>, _>>()
        };

        let default_channels = match &config.default {
            Some(channels) => build_all(channels.as_slice())?,
            None => build_all(&[ChannelConfig::log()])?,
        };

        let mut target_channels = HashMap::with_capacity(config.targets.len());
        for (target, channels) in &config.targets {
            target_channels.insert(target.clone(), build_all(channels.as_slice())?);
        }

        Ok(Self {
            target_channels,
            default_channels,
        })
    }

    /// Replace all channels for a specific target.
    pub fn set_target_channels(&mut self, target: String, channels: Vec<Box<dyn Notifier>>) {
        self.target_channels.insert(target, channels);
    }

    /// Dispatch a notification for a specific target to all its channels.
    ///
    /// Returns results for each channel delivery. Individual failures
    /// don't block other channels.
    pub async fn dispatch(&self, target: &str, notification: &Notification) -> Vec<DispatchResult> {
        let channels = self
            .target_channels
            .get(target)
            .unwrap_or(&self.default_channels);

        if channels.is_empty() {
            tracing::debug!(alert_target = target, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(channels.len());

        for channel in channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::debug!(
                        alert_target = target,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        alert_target = target,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                key: notification.metadata.get("key").cloned().unwrap_or_default(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }

    /// Build a notification for `alert` and dispatch it to the alert's target.
    pub async fn dispatch_alert(&self, alert: &Alert) -> Vec<DispatchResult> {
        let notification = Notification::from_alert(alert, chrono::Utc::now().to_rfc3339());
        self.dispatch(&alert.target, &notification).await
    }

    /// Consume alerts until every sender is dropped.
    ///
    /// This is the sink side of the detector pipeline: evaluation hands
    /// alerts over the channel and never waits for delivery.
    pub async fn run(self: Arc<Self>, mut alerts: mpsc::Receiver<Alert>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(alert) = alerts.recv().await {
            stats.alerts += 1;
            for result in self.dispatch_alert(&alert).await {
                if result.success {
                    stats.delivered += 1;
                } else {
                    stats.failed += 1;
                }
            }
        }
        tracing::info!(
            alerts = stats.alerts,
            delivered = stats.delivered,
            failed = stats.failed,
            "dispatcher drained"
        );
        stats
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |channels: &[Box<dyn Notifier>]| -> Vec<String> {
            channels.iter().map(|c| c.channel_name().to_string()).collect()
        };
        let targets: BTreeMap<&str, Vec<String>> = self
            .target_channels
            .iter()
            .map(|(target, channels)| (target.as_str(), names(channels)))
            .collect();
        f.debug_struct("Dispatcher")
            .field("targets", &targets)
            .field("default", &names(&self.default_channels))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tripwire_core::PayloadFormat;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn mock(name: &str, count: &Arc<AtomicUsize>, should_fail: bool) -> Box<dyn Notifier> {
        Box::new(MockNotifier {
            name: name.to_string(),
            send_count: count.clone(),
            should_fail,
        })
    }

    fn alert(target: &str) -> Alert {
        Alert {
            detector_model: "m".to_string(),
            key: "motor-1".to_string(),
            state: "Dangerous".to_string(),
            event_name: "Pressure Threshold Breached".to_string(),
            target: target.to_string(),
            variables: BTreeMap::new(),
            message: None,
            format: PayloadFormat::String,
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_target_channels(
            "alerts".to_string(),
            vec![mock("a", &count_a, false), mock("b", &count_b, false)],
        );

        let results = dispatcher.dispatch_alert(&alert("alerts")).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].key, "motor-1");
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));
        let unused = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_target_channels(
            "alerts".to_string(),
            vec![mock("fail", &unused, true), mock("ok", &count, false)],
        );

        let results = dispatcher.dispatch_alert(&alert("alerts")).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_target_uses_defaults() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::with_defaults(vec![mock("default", &count, false)]);

        let results = dispatcher.dispatch_alert(&alert("nowhere")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_target_without_defaults_returns_empty() {
        let dispatcher = Dispatcher::empty();
        let results = dispatcher.dispatch_alert(&alert("nowhere")).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn run_drains_channel_and_counts() {
        let count = Arc::new(AtomicUsize::new(0));
        let unused = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_target_channels("ok".to_string(), vec![mock("ok", &count, false)]);
        dispatcher.set_target_channels("bad".to_string(), vec![mock("bad", &unused, true)]);

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(Arc::new(dispatcher).run(rx));
        tx.send(alert("ok")).await.unwrap();
        tx.send(alert("bad")).await.unwrap();
        tx.send(alert("ok")).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(
            stats,
            DispatchStats {
                alerts: 3,
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn from_config_defaults_to_log_channel() {
        let dispatcher = Dispatcher::from_config(&ChannelsConfig::default()).unwrap();
        assert_eq!(dispatcher.default_channels.len(), 1);
        assert_eq!(dispatcher.default_channels[0].channel_name(), "log");
    }

    #[test]
    fn from_config_rejects_invalid_channels() {
        let config = ChannelsConfig::from_yaml_str("default:\n  - channel: webhook\n").unwrap();
        let err = Dispatcher::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("requires 'url'"));
    }

    #[test]
    fn debug_lists_channels_per_target() {
        let config = ChannelsConfig::from_yaml_str(
            "default: []\ntargets:\n  pressure-alerts:\n    - channel: log\n",
        )
        .unwrap();
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        let debug = format!("{dispatcher:?}");
        assert!(debug.contains(r#""pressure-alerts": ["log"]"#), "{debug}");
        assert!(debug.contains("default: []"), "{debug}");
    }
}
