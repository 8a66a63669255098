//! Service Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use monitor::MonitoringStatus;
use provider::{DeployDescriptor, LogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{ManualActionKind, StatusChangeEvent};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::AppState;

/// Response for the service list
#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub data: Vec<MonitoringStatus>,
    pub count: usize,
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServiceListResponse>, ApiError> {
    let data = state.control.list_services().await?;
    Ok(Json(ServiceListResponse {
        count: data.len(),
        data,
    }))
}

pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<Json<MonitoringStatus>, ApiError> {
    state
        .control
        .monitoring_status(&service_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(service_id))
}

#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    /// Destination that also receives this service's alerts
    pub enabled_by: String,
    pub name: Option<String>,
}

pub async fn enable_monitoring(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<EnableRequest>,
) -> Result<Json<MonitoringStatus>, ApiError> {
    let status = state
        .control
        .enable_monitoring(&service_id, body.name.as_deref(), &body.enabled_by)
        .await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct DisableQuery {
    #[serde(default = "default_actor")]
    pub disabled_by: String,
}

fn default_actor() -> String {
    "api".to_string()
}

pub async fn disable_monitoring(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Query(params): Query<DisableQuery>,
) -> Result<StatusCode, ApiError> {
    if state
        .control
        .disable_monitoring(&service_id, &params.disabled_by)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(service_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct DeployNotificationsRequest {
    pub enabled: bool,
}

pub async fn set_deploy_notifications(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<DeployNotificationsRequest>,
) -> Result<Json<MonitoringStatus>, ApiError> {
    let status = state
        .control
        .set_deploy_notifications(&service_id, body.enabled)
        .await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct LogMonitoringRequest {
    pub enabled: bool,
    /// Non-critical errors per scan needed to alert; unchanged when absent
    pub error_threshold: Option<u32>,
}

pub async fn set_log_monitoring(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<LogMonitoringRequest>,
) -> Result<Json<MonitoringStatus>, ApiError> {
    let status = state
        .control
        .set_log_monitoring(&service_id, body.enabled, body.error_threshold)
        .await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct ManualActionRequest {
    pub kind: ManualActionKind,
    /// For `resume`: watch the triggered deploy until it finishes
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Serialize)]
pub struct ManualActionResponse {
    pub service_id: String,
    pub kind: ManualActionKind,
    pub watching: bool,
}

pub async fn record_manual_action(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<ManualActionRequest>,
) -> Result<(StatusCode, Json<ManualActionResponse>), ApiError> {
    let watching = body.watch && body.kind == ManualActionKind::Resume;
    if watching {
        let watch = state.control.resume_and_watch(&service_id).await?;
        let watched = service_id.clone();
        tokio::spawn(async move {
            match watch.await {
                Ok(Ok(outcome)) => info!(service_id = %watched, outcome = ?outcome, "Deploy watch finished"),
                Ok(Err(e)) => warn!(service_id = %watched, error = %e, "Deploy watch failed"),
                Err(e) => warn!(service_id = %watched, error = %e, "Deploy watch panicked"),
            }
        });
    } else {
        state.control.mark_manual_action(&service_id, body.kind).await?;
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ManualActionResponse {
            service_id,
            kind: body.kind,
            watching,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<StatusChangeEvent>>, ApiError> {
    let history = state.control.history(&service_id, params.limit).await?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct PushStatusRequest {
    pub status: String,
}

/// Intake for statuses pushed by the hosting platform
pub async fn push_status(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<PushStatusRequest>,
) -> Result<StatusCode, ApiError> {
    state.pushed.report_status(&service_id, &body.status)?;
    Ok(StatusCode::ACCEPTED)
}

/// Intake for deploys pushed by the hosting platform
pub async fn push_deploy(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<DeployDescriptor>,
) -> Result<StatusCode, ApiError> {
    state.pushed.report_deploy(&service_id, body)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct PushLogsRequest {
    pub lines: Vec<LogEntry>,
}

/// Intake for log lines pushed by the hosting platform
pub async fn push_logs(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Json(body): Json<PushLogsRequest>,
) -> Result<StatusCode, ApiError> {
    state.pushed.report_logs(&service_id, body.lines)?;
    Ok(StatusCode::ACCEPTED)
}
