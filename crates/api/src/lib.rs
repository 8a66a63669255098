//! Fleet Monitor API Server
//!
//! HTTP surface of the monitor: service toggles and manual actions, the
//! global mute, pushed statuses and deploys, CI deploy-window hooks, health
//! and Prometheus metrics.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor::{MonitorContext, PollScheduler, ServiceControl};
use notify::{Destination, LogNotifier, NotificationHub, Notifier, WebhookNotifier};
use provider::PushedStatusProvider;
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use storage::{MemoryStore, SqliteStore, Store};
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

mod error;
mod rate_limit;
mod routes;
mod settings;

pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};
pub use routes::deploy_hooks::TOKEN_HEADER;
pub use settings::{LoggingConfig, NotifyConfig, ServerConfig, Settings, StorageBackend, StorageConfig};

/// Application state shared across handlers
pub struct AppState {
    pub control: ServiceControl,
    /// Receives statuses and deploys pushed over HTTP
    pub pushed: Arc<PushedStatusProvider>,
    /// Shared secret of the CI deploy hooks
    pub deploy_token: Option<String>,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        control: ServiceControl,
        pushed: Arc<PushedStatusProvider>,
        deploy_token: Option<String>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            control,
            pushed,
            deploy_token,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub services: usize,
    pub monitored: usize,
    pub muted_until: Option<DateTime<Utc>>,
}

/// Create the application router.
///
/// The deploy hooks are only rate limited when a governor config is given.
pub fn create_router(
    state: Arc<AppState>,
    limiter: Option<Arc<rate_limit::HookGovernorConfig>>,
) -> Router {
    let mut hooks = Router::new()
        .route("/deploy/start", post(routes::deploy_hooks::start_window))
        .route("/deploy/end", post(routes::deploy_hooks::end_window));
    if let Some(config) = limiter {
        hooks = hooks.layer(GovernorLayer { config });
    }

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/services", get(routes::services::list_services))
        .route("/api/v1/services/:id", get(routes::services::get_service))
        .route(
            "/api/v1/services/:id/monitoring",
            post(routes::services::enable_monitoring).delete(routes::services::disable_monitoring),
        )
        .route(
            "/api/v1/services/:id/deploy-notifications",
            put(routes::services::set_deploy_notifications),
        )
        .route(
            "/api/v1/services/:id/actions",
            post(routes::services::record_manual_action),
        )
        .route("/api/v1/services/:id/history", get(routes::services::get_history))
        .route("/api/v1/services/:id/status", post(routes::services::push_status))
        .route("/api/v1/services/:id/deploys", post(routes::services::push_deploy))
        .route("/api/v1/services/:id/logs", post(routes::services::push_logs))
        .route(
            "/api/v1/services/:id/log-monitoring",
            put(routes::services::set_log_monitoring),
        )
        .route(
            "/api/v1/mute",
            get(routes::mute::get_mute)
                .post(routes::mute::set_mute)
                .delete(routes::mute::clear_mute),
        )
        .merge(hooks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let services = state.control.list_services().await?;
    let monitored = services.iter().filter(|s| s.monitoring_enabled).count();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        services: services.len(),
        monitored,
        muted_until: state.control.muted_until(),
    }))
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(true);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>> {
    Ok(match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteStore::connect(&config.database_url).await?),
    })
}

fn build_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    match config.webhook_url.as_deref() {
        Some(url) => {
            info!("Delivering alerts to webhook {}", url);
            Arc::new(WebhookNotifier::new(url))
        }
        None => {
            info!("No webhook configured, alerts are logged only");
            Arc::new(LogNotifier::new())
        }
    }
}

/// Run the monitor and serve the API until ctrl-c
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let store = open_store(&settings.storage).await?;
    let pushed = Arc::new(PushedStatusProvider::new());
    let hub = Arc::new(NotificationHub::new(
        build_notifier(&settings.notify),
        Destination::new(settings.notify.admin_destination.as_str()),
        settings.monitor.notify_timeout(),
    ));
    let ctx = MonitorContext::new(store, pushed.clone(), hub, settings.monitor.clone());

    let handle = PollScheduler::new(ctx.clone()).spawn();

    if settings.server.deploy_token.is_none() {
        info!("No deploy token configured, CI deploy hooks will refuse every call");
    }
    let limiter = create_governor_config(&settings.server.rate_limit);
    let state = Arc::new(AppState::new(
        ServiceControl::new(ctx),
        pushed,
        settings.server.deploy_token.clone(),
        Some(metrics),
    ));
    let app = create_router(state, limiter);

    info!("Starting API server on {}", settings.server.bind);
    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    handle.stop().await?;
    Ok(())
}
