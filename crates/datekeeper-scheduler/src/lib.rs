//! # DateKeeper Scheduler
//!
//! Expiry status classification and de-duplicated reminder scheduling.
//!
//! ## Design Principles
//! - Pure classification and interval policy, no I/O
//! - SQLite persistence — ledger survives restarts
//! - At most one delivery per (document, interval), even across overlapping passes
//! - Tokio timers only — zero overhead when idle
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (cron "0 9 * * *", tokio interval)
//!   └── ReminderRunner (scope: all | one owner)
//!         ├── list documents, load settings once per owner
//!         └── JoinSet ≤ max_concurrency → Dispatcher (per document)
//!               ├── due intervals − already sent
//!               ├── claim ledger key → re-read document
//!               ├── send via NotificationSender (email, sms)
//!               └── commit | release
//!
//! DocumentService
//!   └── edit expiry / delete → invalidate ledger entries
//! ```

pub mod cron;
pub mod dispatch;
pub mod documents;
pub mod engine;
pub mod ledger;
pub mod persistence;
pub mod policy;
pub mod runner;
pub mod stats;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use cron::CronSchedule;
pub use dispatch::{ChannelFailure, DispatchReport, Dispatcher, DocumentOutcome, IntervalOutcome};
pub use documents::{DocumentService, DocumentView};
pub use engine::{SchedulerEngine, SchedulerStatus, spawn_scheduler};
pub use ledger::{Claim, EntryState, LedgerEntry, LedgerKey, ReminderLedger};
pub use persistence::SqliteStore;
pub use policy::due_intervals;
pub use runner::{OutcomeCounts, ReminderRunner, RunFailure, RunScope, RunSummary, Trigger};
pub use stats::{DocumentStats, aggregate};
pub use status::{DocumentStatus, classify, days_left};
