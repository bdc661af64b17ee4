//! Scheduler runner — one reminder pass over all documents or one user's.
//!
//! Scheduled and manual passes share this code path. `today` is sampled once
//! per pass so every document in the pass is judged against the same date.
//! Dispatch fans out over a `JoinSet`, bounded by a semaphore; one document
//! failing or panicking never aborts the rest of the pass.

use chrono::{DateTime, Local, NaiveDate, Utc};
use datekeeper_core::{
    Channel, DateKeeperError, Document, DocumentStore, NotificationSettings, ReminderInterval, Result,
    SettingsStore,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::dispatch::{DispatchReport, Dispatcher, DocumentOutcome};
use crate::stats::{DocumentStats, aggregate};

/// Which documents a pass covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    All,
    Owner(String),
}

impl RunScope {
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Owner(id) => Some(id),
        }
    }
}

/// Why a pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub sent: usize,
    pub skipped_not_due: usize,
    pub skipped_already_sent: usize,
    pub skipped_no_channel: usize,
    pub superseded: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Sent => self.sent += 1,
            DocumentOutcome::SkippedNotDue => self.skipped_not_due += 1,
            DocumentOutcome::SkippedAlreadySent => self.skipped_already_sent += 1,
            DocumentOutcome::SkippedNoChannel => self.skipped_no_channel += 1,
            DocumentOutcome::Superseded => self.superseded += 1,
            DocumentOutcome::Failed => self.failed += 1,
        }
    }
}

/// One failed document, or one failed channel of a document's interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub document_id: String,
    pub document_name: String,
    pub interval: Option<ReminderInterval>,
    pub channel: Option<Channel>,
    pub error: String,
}

/// Result of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub trigger: Trigger,
    pub owner_id: Option<String>,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub documents: usize,
    pub outcomes: OutcomeCounts,
    pub reminders_sent: usize,
    pub failures: Vec<RunFailure>,
    pub stats: DocumentStats,
    /// The pass outlived its budget; it keeps running in the background.
    pub timed_out: bool,
}

impl RunSummary {
    fn empty(scope: &RunScope, trigger: Trigger, today: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            trigger,
            owner_id: scope.owner().map(str::to_string),
            date: today,
            started_at: now,
            finished_at: now,
            documents: 0,
            outcomes: OutcomeCounts::default(),
            reminders_sent: 0,
            failures: Vec::new(),
            stats: DocumentStats::default(),
            timed_out: false,
        }
    }

    fn record(&mut self, document: &Document, report: DispatchReport) {
        self.outcomes.add(report.outcome);
        self.reminders_sent += report.reminders_sent();
        for (interval, failure) in report.failures() {
            self.failures.push(RunFailure {
                document_id: document.id.clone(),
                document_name: document.name.clone(),
                interval: Some(interval),
                channel: failure.channel,
                error: failure.error.clone(),
            });
        }
    }

    fn record_error(&mut self, document: &Document, error: String) {
        self.outcomes.failed += 1;
        self.failures.push(RunFailure {
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            interval: None,
            channel: None,
            error,
        });
    }
}

/// Runs reminder passes. Cheap to clone.
#[derive(Clone)]
pub struct ReminderRunner {
    documents: Arc<dyn DocumentStore>,
    settings: Arc<dyn SettingsStore>,
    dispatcher: Dispatcher,
    max_concurrency: usize,
    run_timeout: Duration,
}

impl ReminderRunner {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        settings: Arc<dyn SettingsStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            documents,
            settings,
            dispatcher,
            max_concurrency: 8,
            run_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Run a pass for today's local date.
    pub async fn run(&self, scope: RunScope, trigger: Trigger) -> Result<RunSummary> {
        let today = Local::now().date_naive();
        self.run_at(scope, trigger, today).await
    }

    /// Run a pass bounded by the run timeout. On timeout the pass is left to
    /// finish in the background and a `timed_out` summary is returned.
    pub async fn run_with_timeout(&self, scope: RunScope, trigger: Trigger) -> Result<RunSummary> {
        let today = Local::now().date_naive();
        let runner = self.clone();
        let pass_scope = scope.clone();
        let mut handle = tokio::spawn(async move { runner.run_at(pass_scope, trigger, today).await });

        match tokio::time::timeout(self.run_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DateKeeperError::DocumentProcessing(format!("Reminder pass crashed: {e}"))),
            Err(_) => {
                tracing::warn!(
                    "⏳ Reminder pass exceeded {:?}, continuing in background",
                    self.run_timeout
                );
                let mut summary = RunSummary::empty(&scope, trigger, today);
                summary.timed_out = true;
                Ok(summary)
            }
        }
    }

    /// Run a pass as of `today`.
    pub async fn run_at(&self, scope: RunScope, trigger: Trigger, today: NaiveDate) -> Result<RunSummary> {
        let mut summary = RunSummary::empty(&scope, trigger, today);
        let documents = self.documents.list_documents(scope.owner())?;
        summary.documents = documents.len();
        summary.stats = aggregate(&documents, today);

        match trigger {
            Trigger::Scheduled => tracing::info!("⏰ Scheduled reminder pass: {} documents", documents.len()),
            Trigger::Manual => tracing::info!(
                "▶️ Manual reminder pass ({}): {} documents",
                scope.owner().unwrap_or("all users"),
                documents.len()
            ),
        }

        // Settings are read once per owner per pass.
        let mut settings_cache: HashMap<String, std::result::Result<Arc<NotificationSettings>, String>> =
            HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut workers = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, Document> = HashMap::new();

        for document in documents {
            let settings = settings_cache
                .entry(document.owner_id.clone())
                .or_insert_with(|| {
                    self.settings
                        .get_settings(&document.owner_id)
                        .map(Arc::new)
                        .map_err(|e| e.to_string())
                })
                .clone();
            let settings = match settings {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("⚠️ Settings unavailable for {}: {e}", document.owner_id);
                    summary.record_error(&document, format!("settings unavailable: {e}"));
                    continue;
                }
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DateKeeperError::DocumentProcessing(format!("Semaphore closed: {e}")))?;
            let dispatcher = self.dispatcher.clone();
            let snapshot = document.clone();
            let handle = workers.spawn(async move {
                let _permit = permit;
                dispatcher.dispatch(&snapshot, &settings, today).await
            });
            in_flight.insert(handle.id(), document);
        }

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((id, Ok(report))) => {
                    if let Some(document) = in_flight.remove(&id) {
                        summary.record(&document, report);
                    }
                }
                Ok((id, Err(e))) => {
                    if let Some(document) = in_flight.remove(&id) {
                        tracing::warn!("❌ Dispatch for '{}' failed: {e}", document.name);
                        summary.record_error(&document, e.to_string());
                    }
                }
                Err(join_err) => {
                    if let Some(document) = in_flight.remove(&join_err.id()) {
                        tracing::error!("💥 Dispatch for '{}' panicked: {join_err}", document.name);
                        summary.record_error(&document, format!("dispatch panicked: {join_err}"));
                    }
                }
            }
        }

        summary.finished_at = Utc::now();
        tracing::info!(
            "✅ Reminder pass done: {} sent, {} failed, {} documents",
            summary.reminders_sent,
            summary.outcomes.failed,
            summary.documents
        );
        Ok(summary)
    }

    /// Status breakdown for one owner as of today, without dispatching.
    pub fn stats(&self, owner_id: &str) -> Result<DocumentStats> {
        let documents = self.documents.list_documents(Some(owner_id))?;
        Ok(aggregate(&documents, Local::now().date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Claim, LedgerEntry, LedgerKey, ReminderLedger};
    use crate::persistence::SqliteStore;
    use crate::testing::{MockSender, document_in};
    use async_trait::async_trait;
    use datekeeper_core::{NotificationSender, ReminderPayload};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 22).unwrap()
    }

    fn with_email(store: &SqliteStore, owner: &str) {
        let mut s = NotificationSettings::defaults_for(owner);
        s.email = Some(format!("{owner}@example.com"));
        store.put_settings(&s).unwrap();
    }

    fn runner_for(store: Arc<SqliteStore>, sender: Arc<dyn NotificationSender>) -> ReminderRunner {
        let dispatcher = Dispatcher::new(store.clone(), store.clone(), sender, Duration::from_secs(2));
        ReminderRunner::new(store.clone(), store, dispatcher).with_max_concurrency(4)
    }

    #[tokio::test]
    async fn test_pass_summary() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        let runner = runner_for(store.clone(), sender.clone());
        with_email(&store, "u1");
        document_in(&*store, "u1", today(), 25);
        document_in(&*store, "u1", today(), -3);
        document_in(&*store, "u1", today(), 400);

        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.reminders_sent, 3);
        assert_eq!(summary.outcomes.sent, 1);
        assert_eq!(summary.outcomes.skipped_not_due, 2);
        assert_eq!(summary.stats.expired, 1);
        assert_eq!(summary.stats.expiring_this_month, 1);
        assert_eq!(summary.stats.valid, 1);
        assert!(!summary.timed_out);

        let again = runner.run_at(RunScope::All, Trigger::Manual, today()).await.unwrap();
        assert_eq!(again.reminders_sent, 0);
        assert_eq!(again.outcomes.skipped_already_sent, 1);
        assert_eq!(sender.sent_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_passes_send_at_most_once() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        sender.set_delay(Duration::from_millis(20));
        let runner = runner_for(store.clone(), sender.clone());
        with_email(&store, "u1");
        with_email(&store, "u2");
        let a = document_in(&*store, "u1", today(), 25);
        let b = document_in(&*store, "u2", today(), 5);

        let mut passes = JoinSet::new();
        for i in 0..8 {
            let runner = runner.clone();
            let trigger = if i % 2 == 0 { Trigger::Scheduled } else { Trigger::Manual };
            passes.spawn(async move { runner.run_at(RunScope::All, trigger, today()).await });
        }
        let mut total = 0;
        while let Some(res) = passes.join_next().await {
            total += res.unwrap().unwrap().reminders_sent;
        }

        // 3 intervals due for `a`, 4 for `b`; each delivered exactly once.
        assert_eq!(total, 7);
        assert_eq!(sender.sent_count(), 7);
        assert_eq!(store.entries(&a.id).unwrap().len(), 3);
        assert_eq!(store.entries(&b.id).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_owner_scope_only_touches_owner() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        let runner = runner_for(store.clone(), sender.clone());
        with_email(&store, "u1");
        with_email(&store, "u2");
        let mine = document_in(&*store, "u1", today(), 5);
        let theirs = document_in(&*store, "u2", today(), 5);

        let summary = runner
            .run_at(RunScope::Owner("u1".into()), Trigger::Manual, today())
            .await
            .unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.owner_id.as_deref(), Some("u1"));
        assert!(store.has_sent(&LedgerKey::new(&mine.id, ReminderInterval::SevenDays)).unwrap());
        assert!(store.entries(&theirs.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_listed_and_retried() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        sender.fail_channel(Channel::Email);
        let runner = runner_for(store.clone(), sender.clone());
        with_email(&store, "u1");
        let doc = document_in(&*store, "u1", today(), 100);

        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(summary.outcomes.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].document_id, doc.id);
        assert_eq!(summary.failures[0].interval, Some(ReminderInterval::SixMonths));
        assert_eq!(summary.failures[0].channel, Some(Channel::Email));

        sender.clear_failures();
        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(summary.reminders_sent, 1);
        assert!(summary.failures.is_empty());
    }

    /// Panics for one recipient, succeeds for everyone else.
    struct PanickySender {
        inner: MockSender,
    }

    #[async_trait]
    impl NotificationSender for PanickySender {
        async fn send(&self, channel: Channel, recipient: &str, payload: &ReminderPayload) -> Result<()> {
            if recipient.starts_with("boom") {
                panic!("transport exploded");
            }
            self.inner.send(channel, recipient, payload).await
        }
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_one_document() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(PanickySender {
            inner: MockSender::default(),
        });
        let runner = runner_for(store.clone(), sender.clone());
        with_email(&store, "boom");
        with_email(&store, "u1");
        document_in(&*store, "boom", today(), 5);
        document_in(&*store, "u1", today(), 5);

        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.outcomes.failed, 1);
        assert_eq!(summary.outcomes.sent, 1);
        assert!(summary.failures[0].error.contains("panicked"));
        assert_eq!(sender.inner.sent_count(), 4);
    }

    #[tokio::test]
    async fn test_run_timeout_returns_instead_of_hanging() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        sender.set_delay(Duration::from_millis(500));
        let runner = runner_for(store.clone(), sender.clone()).with_run_timeout(Duration::from_millis(50));
        with_email(&store, "u1");
        document_in(&*store, "u1", Local::now().date_naive(), 5);

        let summary = runner
            .run_with_timeout(RunScope::Owner("u1".into()), Trigger::Manual)
            .await
            .unwrap();
        assert!(summary.timed_out);
        assert_eq!(summary.reminders_sent, 0);
    }

    /// Delegates to SQLite but errors when claiming one interval.
    struct BrokenClaimLedger {
        inner: Arc<SqliteStore>,
        broken: ReminderInterval,
    }

    impl ReminderLedger for BrokenClaimLedger {
        fn has_sent(&self, key: &LedgerKey) -> Result<bool> {
            self.inner.has_sent(key)
        }
        fn record_sent(&self, key: &LedgerKey, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool> {
            self.inner.record_sent(key, channels, sent_at)
        }
        fn try_claim(&self, key: &LedgerKey, expiry_date: NaiveDate, now: DateTime<Utc>) -> Result<Option<Claim>> {
            if key.interval == self.broken {
                return Err(DateKeeperError::Ledger("disk I/O error".into()));
            }
            self.inner.try_claim(key, expiry_date, now)
        }
        fn commit(&self, claim: &Claim, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool> {
            self.inner.commit(claim, channels, sent_at)
        }
        fn release(&self, claim: &Claim) -> Result<()> {
            self.inner.release(claim)
        }
        fn invalidate(&self, document_id: &str) -> Result<usize> {
            self.inner.invalidate(document_id)
        }
        fn reschedule(&self, document: &Document) -> Result<Option<usize>> {
            self.inner.reschedule(document)
        }
        fn entries(&self, document_id: &str) -> Result<Vec<LedgerEntry>> {
            self.inner.entries(document_id)
        }
    }

    #[tokio::test]
    async fn test_ledger_error_keeps_earlier_deliveries_in_summary() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let sender = Arc::new(MockSender::default());
        let ledger = Arc::new(BrokenClaimLedger {
            inner: store.clone(),
            broken: ReminderInterval::OneMonth,
        });
        let dispatcher = Dispatcher::new(store.clone(), ledger, sender.clone(), Duration::from_secs(2));
        let runner = ReminderRunner::new(store.clone(), store.clone(), dispatcher);
        with_email(&store, "u1");
        // 6-month and 3-month reminders go out before the 1-month claim fails.
        let doc = document_in(&*store, "u1", today(), 25);

        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(sender.sent_count(), 2);
        assert_eq!(store.entries(&doc.id).unwrap().len(), 2);
        assert_eq!(summary.reminders_sent, 2);
        assert_eq!(summary.outcomes.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].interval, Some(ReminderInterval::OneMonth));
        assert_eq!(summary.failures[0].channel, None);
        assert!(summary.failures[0].error.contains("disk I/O error"));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = runner_for(store, Arc::new(MockSender::default()));
        let summary = runner.run_at(RunScope::All, Trigger::Scheduled, today()).await.unwrap();
        assert_eq!(summary.documents, 0);
        assert_eq!(summary.outcomes, OutcomeCounts::default());
    }
}
