//! SMS Channel — Twilio Messages REST API.
//! POST {api_base}/2010-04-01/Accounts/{sid}/Messages.json with basic auth.

use datekeeper_core::config::SmsConfig;
use datekeeper_core::error::{DateKeeperError, Result};
use datekeeper_core::ReminderPayload;
use serde::Deserialize;
use std::time::Duration;

pub struct SmsSender {
    config: SmsConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    message: Option<String>,
    code: Option<i64>,
}

impl SmsSender {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DateKeeperError::Config(format!("HTTP client: {e}")))?;
        tracing::info!("📱 SMS notifications enabled (from {})", config.from_number);
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    pub async fn send(&self, to: &str, payload: &ReminderPayload) -> Result<()> {
        let body = payload.sms_text();
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| DateKeeperError::Channel(format!("Twilio request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<TwilioError>()
                .await
                .ok()
                .map(|e| format!("{} (code {})", e.message.unwrap_or_default(), e.code.unwrap_or_default()))
                .unwrap_or_default();
            return Err(DateKeeperError::Channel(format!("Twilio API error {status}: {detail}")));
        }

        let sid = resp
            .json::<TwilioMessage>()
            .await
            .ok()
            .and_then(|m| m.sid)
            .unwrap_or_else(|| "?".into());
        tracing::info!("📱 SMS sent to {to} for '{}' (SID: {sid})", payload.document_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use datekeeper_core::{DocumentType, ReminderInterval};

    fn config(api_base: &str) -> SmsConfig {
        SmsConfig {
            enabled: true,
            account_sid: "AC123".into(),
            auth_token: "token".into(),
            from_number: "+15005550006".into(),
            api_base: api_base.into(),
        }
    }

    #[test]
    fn test_messages_url() {
        let sender = SmsSender::new(&config("https://api.twilio.com/")).unwrap();
        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_is_channel_error() {
        // Nothing listens on port 9 locally.
        let sender = SmsSender::new(&config("http://127.0.0.1:9")).unwrap();
        let payload = ReminderPayload {
            document_id: "doc-1".into(),
            document_name: "Visa".into(),
            document_type: DocumentType::Visa,
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            days_remaining: 3,
            interval: ReminderInterval::SevenDays,
        };
        let err = sender.send("+14155550100", &payload).await.unwrap_err();
        assert!(matches!(err, DateKeeperError::Channel(_)));
    }
}
