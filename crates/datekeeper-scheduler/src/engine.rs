//! Scheduler Engine — fires the daily reminder pass on its cron schedule.
//! Uses tokio::interval for ticking (sleeps between checks).

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use datekeeper_core::Result;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::cron::CronSchedule;
use crate::runner::{ReminderRunner, RunScope, RunSummary, Trigger};

/// Snapshot of the engine for health and info endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub cron: String,
    /// A scheduled pass is in progress.
    pub running: bool,
    pub next_run: Option<DateTime<Local>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_summary: Option<RunSummary>,
    pub scheduled_runs: u64,
    pub manual_runs: u64,
}

/// Owns the schedule and the latest run state.
pub struct SchedulerEngine {
    runner: ReminderRunner,
    schedule: CronSchedule,
    status: Mutex<SchedulerStatus>,
}

impl SchedulerEngine {
    pub fn new(runner: ReminderRunner, schedule: CronSchedule, enabled: bool) -> Self {
        let next_run = if enabled { schedule.next_after(&Local::now()) } else { None };
        Self {
            status: Mutex::new(SchedulerStatus {
                enabled,
                cron: schedule.expression().to_string(),
                running: false,
                next_run,
                last_run: None,
                last_summary: None,
                scheduled_runs: 0,
                manual_runs: 0,
            }),
            runner,
            schedule,
        }
    }

    pub fn runner(&self) -> &ReminderRunner {
        &self.runner
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.lock().await.clone()
    }

    /// Run a manual pass now, bounded by the run timeout.
    pub async fn run_now(&self, scope: RunScope) -> Result<RunSummary> {
        let summary = self.runner.run_with_timeout(scope, Trigger::Manual).await?;
        let mut status = self.status.lock().await;
        status.manual_runs += 1;
        status.last_run = Some(summary.finished_at);
        status.last_summary = Some(summary.clone());
        Ok(summary)
    }

    /// Fire the scheduled pass if it is due at `now`. Returns the pass summary
    /// when one ran. Overlapping scheduled passes are skipped.
    pub async fn tick(&self, now: DateTime<Local>) -> Option<RunSummary> {
        {
            let mut status = self.status.lock().await;
            let due = status.enabled && !status.running && status.next_run.is_some_and(|next| next <= now);
            if !due {
                return None;
            }
            status.running = true;
            status.next_run = self.schedule.next_after(&now);
        }

        let result = self.runner.run(RunScope::All, Trigger::Scheduled).await;

        let mut status = self.status.lock().await;
        status.running = false;
        status.scheduled_runs += 1;
        match result {
            Ok(summary) => {
                status.last_run = Some(summary.finished_at);
                status.last_summary = Some(summary.clone());
                Some(summary)
            }
            Err(e) => {
                // Nothing was recorded; the next scheduled pass retries everything.
                tracing::error!("❌ Scheduled reminder pass failed: {e}");
                status.last_run = Some(Utc::now());
                None
            }
        }
    }
}

/// Spawn the scheduler loop as a background tokio task.
pub fn spawn_scheduler(engine: Arc<SchedulerEngine>, check_interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "⏰ Scheduler started ('{}', check every {}s)",
            engine.schedule.expression(),
            check_interval_secs
        );

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Some(summary) = engine.tick(Local::now()).await {
                tracing::info!(
                    "📣 Scheduled pass: {} reminders sent across {} documents",
                    summary.reminders_sent,
                    summary.documents
                );
            }
        }
    })
}
