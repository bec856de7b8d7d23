//! Log-only notifier: writes every notification through `tracing`.
//!
//! Used as the default channel when no channel config is given, and as a
//! cheap audit trail next to real delivery channels.

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Default)]
pub struct LogNotifier {
    /// Emit the full body rather than just the subject.
    verbose: bool,
}

impl LogNotifier {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let key = notification.metadata.get("key").map(String::as_str).unwrap_or("");
        let target = notification.metadata.get("target").map(String::as_str).unwrap_or("");
        if self.verbose {
            tracing::info!(
                channel = "log",
                key,
                alert_target = target,
                subject = %notification.subject,
                body = %notification.body,
                "alert"
            );
        } else {
            tracing::info!(channel = "log", key, alert_target = target, subject = %notification.subject, "alert");
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
