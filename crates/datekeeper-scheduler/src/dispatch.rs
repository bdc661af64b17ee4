//! Reminder dispatch — turns one document's due intervals into deliveries.
//!
//! Per due interval: claim the ledger key, re-read the document, send once per
//! required channel, then commit on full success or release on any failure so
//! the next run retries every channel of that interval.

use chrono::{NaiveDate, Utc};
use datekeeper_core::{
    Channel, ChannelRequirement, Document, DocumentStore, NotificationSender, NotificationSettings,
    ReminderInterval, ReminderPayload, Result,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::ledger::{Claim, LedgerKey, ReminderLedger};
use crate::policy::due_intervals;

/// What happened to one document in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// At least one interval delivered on every required channel.
    Sent,
    /// No enabled interval is due (includes expired documents).
    SkippedNotDue,
    /// Everything due was already delivered or is being delivered by another pass.
    SkippedAlreadySent,
    /// Something is due but the user has no deliverable channel.
    SkippedNoChannel,
    /// The document was edited or deleted while this pass was working on it.
    Superseded,
    /// A send failed; the affected intervals stay unrecorded.
    Failed,
}

impl DocumentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::SkippedNotDue => "skipped_not_due",
            Self::SkippedAlreadySent => "skipped_already_sent",
            Self::SkippedNoChannel => "skipped_no_channel",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    /// `None` when the interval failed before reaching a channel (ledger or store).
    pub channel: Option<Channel>,
    pub error: String,
}

/// Result for a single (document, interval) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IntervalOutcome {
    Sent {
        interval: ReminderInterval,
        channels: Vec<Channel>,
    },
    AlreadySent {
        interval: ReminderInterval,
    },
    Superseded {
        interval: ReminderInterval,
    },
    Failed {
        interval: ReminderInterval,
        failures: Vec<ChannelFailure>,
    },
}

/// Full dispatch result for one document.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub document_id: String,
    pub outcome: DocumentOutcome,
    pub intervals: Vec<IntervalOutcome>,
}

impl DispatchReport {
    fn new(document_id: &str, outcome: DocumentOutcome, intervals: Vec<IntervalOutcome>) -> Self {
        Self {
            document_id: document_id.to_string(),
            outcome,
            intervals,
        }
    }

    /// Number of intervals delivered by this pass.
    pub fn reminders_sent(&self) -> usize {
        self.intervals
            .iter()
            .filter(|i| matches!(i, IntervalOutcome::Sent { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (ReminderInterval, &ChannelFailure)> {
        self.intervals.iter().flat_map(|i| match i {
            IntervalOutcome::Failed { interval, failures } => {
                failures.iter().map(|f| (*interval, f)).collect::<Vec<_>>()
            }
            _ => Vec::new(),
        })
    }
}

/// Sends due reminders for one document at a time. Cheap to clone; every
/// collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct Dispatcher {
    documents: Arc<dyn DocumentStore>,
    ledger: Arc<dyn ReminderLedger>,
    sender: Arc<dyn NotificationSender>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        ledger: Arc<dyn ReminderLedger>,
        sender: Arc<dyn NotificationSender>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            documents,
            ledger,
            sender,
            send_timeout,
        }
    }

    /// Dispatch every due, unsent interval of `document` as of `today`.
    /// `document` is the pass's snapshot; it is re-read after each claim.
    pub async fn dispatch(
        &self,
        document: &Document,
        settings: &NotificationSettings,
        today: NaiveDate,
    ) -> Result<DispatchReport> {
        let due = due_intervals(document.expiry_date, today, &settings.enabled_intervals);
        if due.is_empty() {
            return Ok(DispatchReport::new(&document.id, DocumentOutcome::SkippedNotDue, Vec::new()));
        }

        let mut pending = Vec::with_capacity(due.len());
        let mut intervals = Vec::with_capacity(due.len());
        for interval in due {
            if self.ledger.has_sent(&LedgerKey::new(&document.id, interval))? {
                intervals.push(IntervalOutcome::AlreadySent { interval });
            } else {
                pending.push(interval);
            }
        }
        if pending.is_empty() {
            return Ok(DispatchReport::new(
                &document.id,
                DocumentOutcome::SkippedAlreadySent,
                intervals,
            ));
        }

        let required = settings.required_channels();
        if required.is_empty() {
            tracing::debug!(
                "📭 '{}' has {} due reminder(s) but no deliverable channel",
                document.name,
                pending.len()
            );
            return Ok(DispatchReport::new(
                &document.id,
                DocumentOutcome::SkippedNoChannel,
                intervals,
            ));
        }

        for interval in pending {
            let outcome = match self.dispatch_interval(document, interval, &required, today).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Keep what earlier intervals delivered; stop on a broken store.
                    tracing::warn!(
                        "❌ {} reminder for '{}' aborted: {e}",
                        interval.label(),
                        document.name
                    );
                    intervals.push(IntervalOutcome::Failed {
                        interval,
                        failures: vec![ChannelFailure {
                            channel: None,
                            error: e.to_string(),
                        }],
                    });
                    break;
                }
            };
            let superseded = matches!(outcome, IntervalOutcome::Superseded { .. });
            intervals.push(outcome);
            // Later intervals would be judged against a stale snapshot too.
            if superseded {
                break;
            }
        }

        let outcome = summarize(&intervals);
        Ok(DispatchReport::new(&document.id, outcome, intervals))
    }

    async fn dispatch_interval(
        &self,
        snapshot: &Document,
        interval: ReminderInterval,
        required: &[ChannelRequirement],
        today: NaiveDate,
    ) -> Result<IntervalOutcome> {
        let key = LedgerKey::new(&snapshot.id, interval);
        let Some(claim) = self.ledger.try_claim(&key, snapshot.expiry_date, Utc::now())? else {
            // Sent or in flight elsewhere.
            return Ok(IntervalOutcome::AlreadySent { interval });
        };

        let current = match self.documents.get_document(&snapshot.id) {
            Ok(doc) => doc,
            Err(e) => {
                self.release_quietly(&claim);
                return Err(e);
            }
        };
        let document = match current {
            Some(doc) if doc.expiry_date == snapshot.expiry_date => doc,
            _ => {
                tracing::info!(
                    "🔄 '{}' changed during dispatch, skipping {} reminder",
                    snapshot.name,
                    interval.label()
                );
                self.release_quietly(&claim);
                return Ok(IntervalOutcome::Superseded { interval });
            }
        };

        let payload = ReminderPayload::new(&document, interval, today);
        let mut delivered = Vec::with_capacity(required.len());
        let mut failures = Vec::new();
        for req in required {
            match self.send_one(req, &payload).await {
                Ok(()) => delivered.push(req.channel),
                Err(error) => {
                    tracing::warn!(
                        "❌ {} reminder for '{}' via {} failed: {error}",
                        interval.label(),
                        document.name,
                        req.channel
                    );
                    failures.push(ChannelFailure {
                        channel: Some(req.channel),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            self.release_quietly(&claim);
            return Ok(IntervalOutcome::Failed { interval, failures });
        }

        if self.ledger.commit(&claim, &delivered, Utc::now())? {
            tracing::info!(
                "📨 Sent {} reminder for '{}' via {}",
                interval.label(),
                document.name,
                delivered.iter().map(|c| c.as_str()).collect::<Vec<_>>().join("+")
            );
            Ok(IntervalOutcome::Sent {
                interval,
                channels: delivered,
            })
        } else {
            // Ledger was invalidated mid-send: the document changed under us.
            tracing::info!(
                "🔄 '{}' was edited while sending {} reminder; not recorded",
                document.name,
                interval.label()
            );
            Ok(IntervalOutcome::Superseded { interval })
        }
    }

    async fn send_one(
        &self,
        req: &ChannelRequirement,
        payload: &ReminderPayload,
    ) -> std::result::Result<(), String> {
        match tokio::time::timeout(
            self.send_timeout,
            self.sender.send(req.channel, &req.recipient, payload),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.send_timeout)),
        }
    }

    fn release_quietly(&self, claim: &Claim) {
        if let Err(e) = self.ledger.release(claim) {
            // The claim expires after its lease anyway.
            tracing::warn!("⚠️ Failed to release claim on {}: {e}", claim.key.document_id);
        }
    }
}

fn summarize(intervals: &[IntervalOutcome]) -> DocumentOutcome {
    let any = |pred: fn(&IntervalOutcome) -> bool| intervals.iter().any(pred);
    if any(|i| matches!(i, IntervalOutcome::Failed { .. })) {
        DocumentOutcome::Failed
    } else if any(|i| matches!(i, IntervalOutcome::Superseded { .. })) {
        DocumentOutcome::Superseded
    } else if any(|i| matches!(i, IntervalOutcome::Sent { .. })) {
        DocumentOutcome::Sent
    } else {
        DocumentOutcome::SkippedAlreadySent
    }
}
