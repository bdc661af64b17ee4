//! Outbound notification transport.

use async_trait::async_trait;

use crate::error::Result;
use crate::notification::ReminderPayload;
use crate::types::Channel;

/// Delivers one rendered reminder over one channel. Transport-level retries
/// belong to the implementation; the scheduler only sees success or failure.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, channel: Channel, recipient: &str, payload: &ReminderPayload) -> Result<()>;
}
