//! Reminder ledger — which (document, interval) reminders already went out.
//!
//! The ledger is the only thing preventing duplicate reminders across
//! overlapping or replayed runner passes. A pass takes a key with
//! [`ReminderLedger::try_claim`], a single conditional write, so two passes
//! racing on the same key cannot both proceed. The winner then either
//! [`commit`](ReminderLedger::commit)s after every channel succeeded or
//! [`release`](ReminderLedger::release)s so the next run retries.

use chrono::{DateTime, NaiveDate, Utc};
use datekeeper_core::{Channel, Document, ReminderInterval, Result};
use serde::{Deserialize, Serialize};

/// Ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub document_id: String,
    pub interval: ReminderInterval,
}

impl LedgerKey {
    pub fn new(document_id: &str, interval: ReminderInterval) -> Self {
        Self {
            document_id: document_id.to_string(),
            interval,
        }
    }
}

/// Proof that this pass owns a key until it commits or releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub key: LedgerKey,
    pub token: String,
}

/// State of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Taken by an in-flight pass, not yet delivered.
    Claimed,
    /// Delivered on every required channel.
    Sent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub document_id: String,
    pub interval: ReminderInterval,
    pub state: EntryState,
    pub channels: Vec<Channel>,
    /// Expiry date the reminder was computed against.
    pub expiry_date: Option<NaiveDate>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Durable at-most-once record of delivered reminders.
pub trait ReminderLedger: Send + Sync {
    /// Whether a reminder for this key was fully delivered.
    fn has_sent(&self, key: &LedgerKey) -> Result<bool>;

    /// Record a delivered reminder if none exists. Returns `false` (not an
    /// error) when the key was already recorded.
    fn record_sent(&self, key: &LedgerKey, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool>;

    /// Atomically take the key for dispatch. `None` when another pass holds a
    /// live claim or the reminder was already sent.
    fn try_claim(&self, key: &LedgerKey, expiry_date: NaiveDate, now: DateTime<Utc>) -> Result<Option<Claim>>;

    /// Mark a claimed key as sent. Returns `false` when the claim no longer
    /// exists (invalidated by an edit or delete in the meantime).
    fn commit(&self, claim: &Claim, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool>;

    /// Drop an uncommitted claim so the key is retried next run.
    fn release(&self, claim: &Claim) -> Result<()>;

    /// Remove every entry for a document. Returns the number removed.
    fn invalidate(&self, document_id: &str) -> Result<usize>;

    /// Store an edited document and remove its entries in one atomic step, so
    /// no pass can read the new expiry date next to the old history. Returns
    /// the number of entries removed, or `None` if the document is gone.
    fn reschedule(&self, document: &Document) -> Result<Option<usize>>;

    /// All entries for a document, longest lead first.
    fn entries(&self, document_id: &str) -> Result<Vec<LedgerEntry>>;
}
