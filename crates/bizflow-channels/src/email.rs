//! Email notifications — async SMTP sending via lettre.
//!
//! Implements the `Notifier` seam: every failure (disabled transport, bad
//! addresses, relay rejection) is carried in the `SendOutcome`, never an
//! error, so the step interpreter's control flow stays uniform.

use async_trait::async_trait;
use bizflow_core::config::EmailConfig;
use bizflow_core::error::{BizflowError, Result};
use bizflow_core::traits::Notifier;
use bizflow_core::types::SendOutcome;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct EmailNotifier {
    config: EmailConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailNotifier {
    /// Build the SMTP transport from config. Building does no I/O; the
    /// connection is made per send.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let transport = if config.smtp_enabled {
            let relay = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| BizflowError::Channel(format!("SMTP relay: {e}")))?
                .port(config.smtp_port)
                .credentials(Credentials::new(config.email.clone(), config.password.clone()));
            Some(relay.build())
        } else {
            None
        };
        Ok(Self { config: config.clone(), transport })
    }

    fn sender(&self) -> String {
        match &self.config.display_name {
            Some(name) => format!("{name} <{}>", self.config.email),
            None => self.config.email.clone(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_email(&self, to: &str, body: &str) -> SendOutcome {
        let Some(transport) = &self.transport else {
            return SendOutcome::fail("SMTP sending is disabled");
        };

        let from = match self.sender().parse::<Mailbox>() {
            Ok(mailbox) => mailbox,
            Err(e) => return SendOutcome::fail(format!("Invalid sender address: {e}")),
        };
        let recipient = match to.parse::<Mailbox>() {
            Ok(mailbox) => mailbox,
            Err(e) => return SendOutcome::fail(format!("Invalid recipient {to}: {e}")),
        };

        let message = match Message::builder()
            .from(from)
            .to(recipient)
            .subject(self.config.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(format!("<div><p>{body}</p></div>"))
        {
            Ok(message) => message,
            Err(e) => return SendOutcome::fail(format!("Message build failed: {e}")),
        };

        match transport.send(message).await {
            Ok(_) => {
                tracing::info!("✅ Email notification sent to {to}");
                SendOutcome::ok()
            }
            Err(e) => SendOutcome::fail(format!("Email send failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool) -> EmailConfig {
        EmailConfig {
            email: "agent@example.com".into(),
            smtp_enabled: enabled,
            ..EmailConfig::default()
        }
    }

    #[tokio::test]
    async fn disabled_transport_reports_failure() {
        let notifier = EmailNotifier::new(&config(false)).unwrap();
        let outcome = notifier.send_email("ops@example.com", "done").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("disabled"));
    }

    #[tokio::test]
    async fn invalid_recipient_fails_before_sending() {
        let notifier = EmailNotifier::new(&config(true)).unwrap();
        let outcome = notifier.send_email("not an address", "done").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not an address"));
    }
}
