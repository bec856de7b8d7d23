//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers detector alerts as emails through an SMTP server.
//! Supports STARTTLS and implicit TLS connections.

use std::sync::Arc;

use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Sender mailbox.
    from: Mailbox,
    /// Recipient mailboxes.
    to: Vec<Mailbox>,
    /// Optional minijinja subject template; defaults to the notification subject.
    subject_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP configuration.
    ///
    /// - `smtp_host`: SMTP server hostname.
    /// - `smtp_port`: Optional port (defaults to 587, or 465 for implicit TLS).
    /// - `tls`: Whether to use TLS. `None` or `Some(true)` enables STARTTLS;
    ///   port 465 always uses implicit TLS regardless of this flag.
    /// - `from`: Sender email address (e.g. `"alerts@example.com"` or `"Alerts <alerts@example.com>"`).
    /// - `to`: Recipient email addresses.
    /// - `subject`: Optional subject template rendered against the alert.
    ///
    /// SMTP credentials are resolved from the `SMTP_USERNAME` and `SMTP_PASSWORD`
    /// environment variables. If both are set, they are passed to the transport;
    /// otherwise the connection is unauthenticated.
    pub fn from_config(
        smtp_host: &str,
        smtp_port: Option<u16>,
        tls: Option<bool>,
        from: &str,
        to: &[String],
        subject: Option<String>,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let from_mailbox: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let to_mailboxes: Vec<Mailbox> = to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(ref tmpl) = subject {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid subject template: {e}")))?;
        }

        if to_mailboxes.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let port = smtp_port.unwrap_or(587);
        let use_tls = tls.unwrap_or(true);

        // Port 465 uses implicit TLS; everything else uses STARTTLS when TLS is enabled.
        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host).port(port)
        };

        // Attach credentials from environment if available.
        if let (Ok(username), Ok(password)) =
            (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let transport = builder.build();

        Ok(Self {
            transport,
            from: from_mailbox,
            to: to_mailboxes,
            subject_template: subject,
            renderer,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    /// Send a notification email to all configured recipients.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut message_builder = Message::builder().from(self.from.clone());

        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }

        let subject = match &self.subject_template {
            Some(tmpl) => self.renderer.render(tmpl, &notification.context)?,
            None => notification.subject.clone(),
        };

        let email = message_builder
            .subject(subject.as_str())
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            subject = %subject,
            recipients = self.to.len(),
            "notification delivered"
        );

        Ok(())
    }

    /// Returns `"email"`.
    fn channel_name(&self) -> &str {
        "email"
    }
}
