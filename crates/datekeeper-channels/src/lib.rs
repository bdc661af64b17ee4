//! # DateKeeper Channels
//! Notification channel implementations: SMTP email, Twilio SMS and a console
//! log, routed behind one [`NotificationSender`].

pub mod console;
pub mod email;
pub mod sms;

use async_trait::async_trait;
use datekeeper_core::config::DateKeeperConfig;
use datekeeper_core::error::{DateKeeperError, Result};
use datekeeper_core::{Channel, NotificationSender, ReminderPayload};

pub use console::ConsoleSender;
pub use email::EmailSender;
pub use sms::SmsSender;

/// Routes each send to the transport for its channel. A channel with no
/// configured transport fails the send, so the reminder is retried once it is
/// configured.
#[derive(Default)]
pub struct ChannelRouter {
    email: Option<EmailSender>,
    sms: Option<SmsSender>,
    console: Option<ConsoleSender>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DateKeeperConfig) -> Result<Self> {
        let mut router = Self::new();
        if config.email.is_usable() {
            router.email = Some(EmailSender::new(&config.email)?);
        } else {
            tracing::warn!("⚠️ Email notifications disabled (no SMTP config)");
        }
        if config.sms.is_usable() {
            router.sms = Some(SmsSender::new(&config.sms)?);
        } else {
            tracing::warn!("⚠️ SMS notifications disabled (no Twilio config)");
        }
        if config.console_log {
            router.console = Some(ConsoleSender);
        }
        Ok(router)
    }

    pub fn with_console(mut self) -> Self {
        self.console = Some(ConsoleSender);
        self
    }

    /// Channels with a working transport.
    pub fn available(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.email.is_some() {
            channels.push(Channel::Email);
        }
        if self.sms.is_some() {
            channels.push(Channel::Sms);
        }
        channels
    }
}

#[async_trait]
impl NotificationSender for ChannelRouter {
    async fn send(&self, channel: Channel, recipient: &str, payload: &ReminderPayload) -> Result<()> {
        if let Some(console) = &self.console {
            console.log(channel, recipient, payload);
        }
        match channel {
            Channel::Email => match &self.email {
                Some(email) => email.send(recipient, payload).await,
                None => Err(DateKeeperError::Channel("email channel not configured".into())),
            },
            Channel::Sms => match &self.sms {
                Some(sms) => sms.send(recipient, payload).await,
                None => Err(DateKeeperError::Channel("SMS channel not configured".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use datekeeper_core::{DocumentType, ReminderInterval};

    fn payload() -> ReminderPayload {
        ReminderPayload {
            document_id: "doc-1".into(),
            document_name: "Insurance".into(),
            document_type: DocumentType::VehicleInsurance,
            expiry_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            days_remaining: 30,
            interval: ReminderInterval::OneMonth,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_channels_fail() {
        let router = ChannelRouter::new().with_console();
        assert!(router.available().is_empty());
        let err = router.send(Channel::Email, "a@example.com", &payload()).await.unwrap_err();
        assert!(matches!(err, DateKeeperError::Channel(_)));
        let err = router.send(Channel::Sms, "+14155550100", &payload()).await.unwrap_err();
        assert!(matches!(err, DateKeeperError::Channel(_)));
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = DateKeeperConfig::default();
        config.sms.enabled = true;
        config.sms.account_sid = "AC123".into();
        config.sms.auth_token = "token".into();
        config.sms.from_number = "+15005550006".into();
        let router = ChannelRouter::from_config(&config).unwrap();
        assert_eq!(router.available(), vec![Channel::Sms]);
    }
}
