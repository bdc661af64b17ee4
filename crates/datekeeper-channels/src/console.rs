//! Console channel — writes every reminder to the log. Used in development
//! and alongside the real channels when `console_log` is on.

use datekeeper_core::{Channel, ReminderPayload};

pub struct ConsoleSender;

impl ConsoleSender {
    pub fn log(&self, channel: Channel, recipient: &str, payload: &ReminderPayload) {
        let body = match channel {
            Channel::Email => payload.email_subject(),
            Channel::Sms => payload.sms_text(),
        };
        tracing::info!(
            target: "datekeeper::reminders",
            document = %payload.document_id,
            interval = %payload.interval,
            "🔔 [{channel} → {recipient}] {body}"
        );
    }
}
