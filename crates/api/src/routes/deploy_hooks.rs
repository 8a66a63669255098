//! CI Deploy Window Hooks
//!
//! `POST /deploy/start` and `POST /deploy/end`, authenticated with the
//! `X-Deploy-Token` shared secret. The body may be empty; `service_ids` may
//! be a single id or a list and defaults to every known service.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// `X-Deploy-Token`, lowercase as stored in a `HeaderMap`
pub const TOKEN_HEADER: &str = "x-deploy-token";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ServiceIds {
    One(String),
    Many(Vec<String>),
}

impl ServiceIds {
    fn into_vec(self) -> Vec<String> {
        match self {
            ServiceIds::One(id) => vec![id],
            ServiceIds::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployWindowRequest {
    pub minutes: Option<i64>,
    pub service_ids: Option<ServiceIds>,
}

#[derive(Debug, Serialize)]
pub struct DeployWindowResponse {
    pub status: &'static str,
    pub applied_to: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state.deploy_token.as_deref().filter(|t| !t.is_empty());
    let presented = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    match (expected, presented) {
        (Some(expected), Some(presented)) if expected == presented => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

fn parse_body(body: &Bytes) -> Result<DeployWindowRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeployWindowRequest::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("invalid json".to_string()))
}

fn service_ids(request: &mut DeployWindowRequest) -> Vec<String> {
    request
        .service_ids
        .take()
        .map(ServiceIds::into_vec)
        .unwrap_or_default()
}

pub async fn start_window(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeployWindowResponse>, ApiError> {
    metrics::counter!("api_deploy_hook_calls_total", "hook" => "start").increment(1);
    authorize(&state, &headers)?;
    let mut request = parse_body(&body)?;

    let minutes = request
        .minutes
        .and_then(|m| u64::try_from(m).ok())
        .filter(|m| *m > 0)
        .ok_or_else(|| ApiError::BadRequest("minutes must be positive int".to_string()))?;

    let ids = service_ids(&mut request);
    let applied = state.control.start_deploy_window(&ids, minutes).await?;
    Ok(Json(DeployWindowResponse {
        status: "ok",
        applied_to: applied.len(),
        minutes: Some(minutes),
    }))
}

pub async fn end_window(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeployWindowResponse>, ApiError> {
    metrics::counter!("api_deploy_hook_calls_total", "hook" => "end").increment(1);
    authorize(&state, &headers)?;
    let mut request = parse_body(&body)?;

    let ids = service_ids(&mut request);
    let applied = state.control.end_deploy_window(&ids).await?;
    Ok(Json(DeployWindowResponse {
        status: "ok",
        applied_to: applied.len(),
        minutes: None,
    }))
}
