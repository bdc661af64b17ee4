//! Email Channel — SMTP sending via async lettre.
//!
//! Reminders go out as multipart/alternative (plain text + HTML). Port 465
//! uses implicit TLS, anything else STARTTLS. Works with Gmail, Outlook and
//! custom servers.

use datekeeper_core::config::SmtpConfig;
use datekeeper_core::error::{DateKeeperError, Result};
use datekeeper_core::ReminderPayload;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Sends reminder emails over one pooled SMTP transport.
pub struct EmailSender {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let address = if config.from_address.is_empty() {
            &config.username
        } else {
            &config.from_address
        };
        let from = Mailbox::new(
            Some(config.from_name.clone()),
            address
                .parse()
                .map_err(|e| DateKeeperError::Config(format!("Invalid sender address '{address}': {e}")))?,
        );

        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| DateKeeperError::Config(format!("SMTP relay: {e}")))?;

        let mailer = builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .timeout(Some(Duration::from_secs(30)))
            .build();

        tracing::info!("✉️  Email notifications enabled ({}:{})", config.host, config.port);
        Ok(Self { from, mailer })
    }

    /// Render the reminder for one recipient.
    pub fn build_message(&self, to: &str, payload: &ReminderPayload) -> Result<Message> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| DateKeeperError::Channel(format!("Invalid to: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(payload.email_subject())
            .multipart(MultiPart::alternative_plain_html(
                payload.email_text(),
                payload.email_html(),
            ))
            .map_err(|e| DateKeeperError::Channel(format!("Build email: {e}")))
    }

    pub async fn send(&self, to: &str, payload: &ReminderPayload) -> Result<()> {
        let email = self.build_message(to, payload)?;
        self.mailer
            .send(email)
            .await
            .map_err(|e| DateKeeperError::Channel(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to {to} for '{}'", payload.document_name);
        Ok(())
    }
}
