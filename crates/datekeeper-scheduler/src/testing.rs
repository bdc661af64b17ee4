//! Test doubles shared by the scheduler's unit tests.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use datekeeper_core::{
    Channel, DateKeeperError, Document, DocumentStore, DocumentType, NotificationSender, ReminderPayload,
    Result,
};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: Channel,
    pub recipient: String,
    pub payload: ReminderPayload,
}

/// Records every send; can be told to fail a channel or to stall.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<Channel>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockSender {
    pub fn fail_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().insert(channel);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_on(&self, channel: Channel) -> usize {
        self.sent.lock().unwrap().iter().filter(|m| m.channel == channel).count()
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    async fn send(&self, channel: Channel, recipient: &str, payload: &ReminderPayload) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.failing.lock().unwrap().contains(&channel) {
            return Err(DateKeeperError::Channel(format!("{channel} unavailable")));
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel,
            recipient: recipient.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Insert a document expiring `days` after `today`.
pub fn document_in(store: &dyn DocumentStore, owner: &str, today: NaiveDate, days: i64) -> Document {
    let doc = Document::new(owner, &format!("Doc +{days}"), DocumentType::Passport, today + Duration::days(days));
    store.insert_document(&doc).unwrap();
    doc
}
