//! API route handlers for the gateway.
//!
//! Every response uses the `{"ok": bool, ...}` envelope. Validation errors map
//! to 400, missing records to 404, everything else to 500.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Local;
use datekeeper_core::{
    DateKeeperError, DocumentDraft, DocumentPatch, ReminderInterval, SettingsStore, SettingsUpdate,
};
use datekeeper_scheduler::{DocumentStatus, DocumentView, RunScope, RunSummary};
use serde_json::{Value, json};
use std::sync::Arc;

use super::server::AppState;

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

fn error_response(e: DateKeeperError) -> ApiResponse {
    let status = match &e {
        DateKeeperError::Validation(_) => StatusCode::BAD_REQUEST,
        DateKeeperError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            tracing::error!("❌ Request failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"ok": false, "error": e.to_string()})))
}

fn summary_response(summary: RunSummary) -> ApiResponse {
    if summary.timed_out {
        // Still running in the background; results land in the ledger.
        return (
            StatusCode::ACCEPTED,
            Json(json!({
                "ok": true,
                "timed_out": true,
                "message": "Reminder pass is taking longer than expected and continues in the background",
            })),
        );
    }
    ok(json!({"ok": true, "summary": summary}))
}

// ---- Health & Info ----

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "datekeeper",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Scheduler state: schedule, next and last run.
pub async fn scheduler_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.engine.status().await;
    Json(json!({
        "ok": true,
        "scheduler": status,
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Interval catalogue and status thresholds.
pub async fn scheduler_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let intervals: Vec<Value> = ReminderInterval::ALL
        .iter()
        .map(|i| {
            json!({
                "id": i.id(),
                "days": i.days(),
                "label": i.label(),
                "default": ReminderInterval::DEFAULTS.contains(i),
            })
        })
        .collect();
    Json(json!({
        "ok": true,
        "cron": state.config.scheduler.cron,
        "enabled": state.config.scheduler.enabled,
        "intervals": intervals,
        "statuses": [
            {"status": DocumentStatus::Expired.as_str(), "days_left": "< 0"},
            {"status": DocumentStatus::ExpiringSoon.as_str(), "days_left": "0-7"},
            {"status": DocumentStatus::ExpiringThisMonth.as_str(), "days_left": "8-30"},
            {"status": DocumentStatus::Valid.as_str(), "days_left": "> 30"},
        ],
    }))
}

// ---- Manual runs ----

/// Run a reminder pass over every document now.
pub async fn run_now_all(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.engine.run_now(RunScope::All).await {
        Ok(summary) => summary_response(summary),
        Err(e) => error_response(e),
    }
}

/// Run a reminder pass over one user's documents now.
pub async fn run_now_owner(State(state): State<Arc<AppState>>, Path(owner): Path<String>) -> ApiResponse {
    match state.engine.run_now(RunScope::Owner(owner)).await {
        Ok(summary) => summary_response(summary),
        Err(e) => error_response(e),
    }
}

pub async fn user_stats(State(state): State<Arc<AppState>>, Path(owner): Path<String>) -> ApiResponse {
    match state.engine.runner().stats(&owner) {
        Ok(stats) => ok(json!({"ok": true, "stats": stats})),
        Err(e) => error_response(e),
    }
}

// ---- Settings ----

pub async fn get_settings(State(state): State<Arc<AppState>>, Path(owner): Path<String>) -> ApiResponse {
    match state.store.get_settings(&owner) {
        Ok(settings) => ok(json!({"ok": true, "settings": settings.to_json()})),
        Err(e) => error_response(e),
    }
}

/// Replace a user's notification settings.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(body): Json<SettingsUpdate>,
) -> ApiResponse {
    let result = body
        .into_settings(&owner)
        .and_then(|settings| state.store.put_settings(&settings).map(|_| settings));
    match result {
        Ok(settings) => {
            tracing::info!("⚙️ Settings updated for {owner}");
            ok(json!({"ok": true, "settings": settings.to_json()}))
        }
        Err(e) => error_response(e),
    }
}

// ---- Documents ----

pub async fn list_documents(State(state): State<Arc<AppState>>, Path(owner): Path<String>) -> ApiResponse {
    let today = Local::now().date_naive();
    match state.documents.list(&owner) {
        Ok(docs) => {
            let views: Vec<DocumentView> = docs.into_iter().map(|d| DocumentView::new(d, today)).collect();
            ok(json!({"ok": true, "documents": views, "count": views.len()}))
        }
        Err(e) => error_response(e),
    }
}

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(draft): Json<DocumentDraft>,
) -> ApiResponse {
    match state.documents.create(&owner, &draft) {
        Ok(doc) => (
            StatusCode::CREATED,
            Json(json!({"ok": true, "document": DocumentView::new(doc, Local::now().date_naive())})),
        ),
        Err(e) => error_response(e),
    }
}

/// One document with its reminder history.
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResponse {
    let result = state
        .documents
        .get(&owner, &id)
        .and_then(|doc| state.documents.reminders(&owner, &id).map(|r| (doc, r)));
    match result {
        Ok((doc, reminders)) => ok(json!({
            "ok": true,
            "document": DocumentView::new(doc, Local::now().date_naive()),
            "reminders": reminders,
        })),
        Err(e) => error_response(e),
    }
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
    Json(patch): Json<DocumentPatch>,
) -> ApiResponse {
    match state.documents.update(&owner, &id, &patch) {
        Ok(doc) => ok(json!({"ok": true, "document": DocumentView::new(doc, Local::now().date_naive())})),
        Err(e) => error_response(e),
    }
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResponse {
    match state.documents.delete(&owner, &id) {
        Ok(()) => ok(json!({"ok": true})),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use datekeeper_core::{Channel, DateKeeperConfig, NotificationSender, ReminderPayload, Result};
    use datekeeper_scheduler::SqliteStore;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Collects sends in memory.
    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(Channel, String)>>,
    }

    #[async_trait]
    impl NotificationSender for Outbox {
        async fn send(&self, channel: Channel, recipient: &str, _payload: &ReminderPayload) -> Result<()> {
            self.sent.lock().unwrap().push((channel, recipient.to_string()));
            Ok(())
        }
    }

    fn app_state() -> (Arc<Outbox>, Arc<AppState>) {
        let outbox = Arc::new(Outbox::default());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let state = AppState::with_parts(DateKeeperConfig::default(), store, outbox.clone()).unwrap();
        (outbox, Arc::new(state))
    }

    fn test_state() -> State<Arc<AppState>> {
        State(app_state().1)
    }

    fn in_days(days: i64) -> String {
        (Local::now().date_naive() + chrono::Duration::days(days)).to_string()
    }

    fn draft(name: &str, expiry: String) -> Json<DocumentDraft> {
        Json(DocumentDraft {
            name: name.into(),
            document_type: Some("passport".into()),
            expiry_date: Some(expiry),
            ocr: None,
        })
    }

    // ---- Health & Info ----

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_scheduler_info() {
        let json = scheduler_info(test_state()).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["intervals"].as_array().unwrap().len(), 5);
        assert_eq!(json["intervals"][0]["id"], "6_months");
        assert_eq!(json["intervals"][4]["default"], false);
        assert_eq!(json["cron"], "0 9 * * *");
    }

    #[tokio::test]
    async fn test_scheduler_health() {
        let json = scheduler_health(test_state()).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["scheduler"]["running"], false);
        assert!(json["scheduler"]["last_summary"].is_null());
    }

    // ---- Settings ----

    #[tokio::test]
    async fn test_settings_defaults_and_update() {
        let state = test_state();
        let (status, json) = get_settings(state.clone(), Path("u1".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["settings"]["notify_email"], true);
        assert_eq!(json["settings"]["reminder_intervals"]["7_days"], true);
        assert_eq!(json["settings"]["reminder_intervals"]["on_expiry"], false);

        let update: SettingsUpdate = serde_json::from_value(json!({
            "email": "u1@example.com",
            "notify_sms": true,
            "phone": "+14155550100",
            "reminder_intervals": {"7_days": true, "on_expiry": true},
        }))
        .unwrap();
        let (status, json) = update_settings(state.clone(), Path("u1".into()), Json(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["settings"]["reminder_intervals"]["on_expiry"], true);
        assert_eq!(json["settings"]["reminder_intervals"]["6_months"], false);
    }

    #[tokio::test]
    async fn test_settings_unknown_interval_is_400() {
        let update: SettingsUpdate = serde_json::from_value(json!({
            "reminder_intervals": {"2_weeks": true},
        }))
        .unwrap();
        let (status, json) = update_settings(test_state(), Path("u1".into()), Json(update)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
    }

    // ---- Documents ----

    #[tokio::test]
    async fn test_document_lifecycle() {
        let state = test_state();
        let (status, json) = create_document(state.clone(), Path("u1".into()), draft("Passport", in_days(5))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["document"]["status"], "expiring_soon");
        let id = json["document"]["id"].as_str().unwrap().to_string();

        let (_, json) = list_documents(state.clone(), Path("u1".into())).await;
        assert_eq!(json["count"], 1);

        let patch = Json(DocumentPatch {
            expiry_date: Some(in_days(400)),
            ..Default::default()
        });
        let (status, json) = update_document(state.clone(), Path(("u1".into(), id.clone())), patch).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["document"]["status"], "valid");

        let (status, _) = get_document(state.clone(), Path(("u2".into(), id.clone()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_document(state.clone(), Path(("u1".into(), id.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = get_document(state, Path(("u1".into(), id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["ok"], false);
    }

    #[tokio::test]
    async fn test_create_document_bad_date_is_400() {
        let (status, json) =
            create_document(test_state(), Path("u1".into()), draft("Visa", "31-12-2027".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
    }

    // ---- Runs & stats ----

    #[tokio::test]
    async fn test_run_now_owner_sends_once() {
        let (outbox, state) = app_state();
        let update: SettingsUpdate = serde_json::from_value(json!({"email": "u1@example.com"})).unwrap();
        update_settings(State(state.clone()), Path("u1".into()), Json(update)).await;
        create_document(State(state.clone()), Path("u1".into()), draft("Passport", in_days(25))).await;

        let (status, json) = run_now_owner(State(state.clone()), Path("u1".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["summary"]["reminders_sent"], 3);
        assert_eq!(json["summary"]["trigger"], "manual");

        let (_, json) = run_now_all(State(state.clone())).await;
        assert_eq!(json["summary"]["reminders_sent"], 0);
        assert_eq!(json["summary"]["outcomes"]["skipped_already_sent"], 1);
        assert_eq!(outbox.sent.lock().unwrap().len(), 3);

        let (_, json) = user_stats(State(state), Path("u1".into())).await;
        assert_eq!(json["stats"]["total"], 1);
        assert_eq!(json["stats"]["expiring_this_month"], 1);
    }

    #[tokio::test]
    async fn test_router_serves_health_and_404s() {
        let (_, state) = app_state();
        let app = build_router((*state).clone());

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/users/u1/documents/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["ok"], false);
    }
}
