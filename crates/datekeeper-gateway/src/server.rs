//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use datekeeper_channels::ChannelRouter;
use datekeeper_core::{DateKeeperConfig, NotificationSender};
use datekeeper_scheduler::{
    CronSchedule, Dispatcher, DocumentService, ReminderRunner, SchedulerEngine, SqliteStore, spawn_scheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: DateKeeperConfig,
    pub start_time: std::time::Instant,
    /// Documents, settings and reminder ledger.
    pub store: Arc<SqliteStore>,
    /// Document CRUD with ledger invalidation.
    pub documents: DocumentService,
    /// Scheduler engine — cron state plus the reminder runner.
    pub engine: Arc<SchedulerEngine>,
}

impl AppState {
    /// Wire the store, channels and scheduler from configuration.
    pub fn from_config(config: DateKeeperConfig) -> anyhow::Result<Self> {
        let db_path = PathBuf::from(shellexpand::tilde(&config.database.path).as_ref());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStore::open(&db_path)?.with_claim_lease(config.scheduler.claim_lease_secs)?);
        tracing::info!("💾 Database: {}", db_path.display());

        let sender: Arc<dyn NotificationSender> = Arc::new(ChannelRouter::from_config(&config)?);
        Self::with_parts(config, store, sender)
    }

    /// Build state around an existing store and sender.
    pub fn with_parts(
        config: DateKeeperConfig,
        store: Arc<SqliteStore>,
        sender: Arc<dyn NotificationSender>,
    ) -> anyhow::Result<Self> {
        let sched = &config.scheduler;
        let dispatcher = Dispatcher::new(
            store.clone(),
            store.clone(),
            sender,
            Duration::from_secs(sched.send_timeout_secs),
        );
        let runner = ReminderRunner::new(store.clone(), store.clone(), dispatcher)
            .with_max_concurrency(sched.max_concurrency)
            .with_run_timeout(Duration::from_secs(sched.run_timeout_secs));
        let schedule = CronSchedule::parse(&sched.cron)?;
        let engine = Arc::new(SchedulerEngine::new(runner, schedule, sched.enabled));

        Ok(Self {
            documents: DocumentService::new(store.clone(), store.clone()),
            start_time: std::time::Instant::now(),
            store,
            engine,
            config,
        })
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    use super::routes;

    let api = Router::new()
        // Scheduler
        .route("/api/v1/scheduler/health", get(routes::scheduler_health))
        .route("/api/v1/scheduler/info", get(routes::scheduler_info))
        .route("/api/v1/scheduler/run-now", post(routes::run_now_all))
        // Per-user
        .route("/api/v1/users/{owner}/run-now", post(routes::run_now_owner))
        .route("/api/v1/users/{owner}/stats", get(routes::user_stats))
        .route(
            "/api/v1/users/{owner}/settings",
            get(routes::get_settings).put(routes::update_settings),
        )
        .route(
            "/api/v1/users/{owner}/documents",
            get(routes::list_documents).post(routes::create_document),
        )
        .route(
            "/api/v1/users/{owner}/documents/{id}",
            get(routes::get_document)
                .put(routes::update_document)
                .delete(routes::delete_document),
        );

    Router::new()
        .route("/health", get(routes::health_check))
        .merge(api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server and the scheduler loop.
pub async fn start(config: DateKeeperConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let sched = &state.config.scheduler;

    if sched.enabled {
        spawn_scheduler(state.engine.clone(), sched.check_interval_secs);
    } else {
        tracing::warn!("⏸️ Scheduler disabled; reminders only go out on manual runs");
    }

    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let app = build_router_from_arc(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
