//! Global Mute Routes

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
}

impl MuteResponse {
    fn from_until(muted_until: Option<DateTime<Utc>>) -> Self {
        Self {
            muted: muted_until.is_some(),
            muted_until,
        }
    }
}

/// Either a relative duration or an absolute expiry
#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub minutes: Option<u64>,
    pub until: Option<DateTime<Utc>>,
}

pub async fn get_mute(State(state): State<Arc<AppState>>) -> Json<MuteResponse> {
    Json(MuteResponse::from_until(state.control.muted_until()))
}

pub async fn set_mute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MuteRequest>,
) -> Result<Json<MuteResponse>, ApiError> {
    match (body.minutes, body.until) {
        (Some(minutes), None) if minutes > 0 => {
            state
                .control
                .mute_for(Duration::from_secs(minutes.saturating_mul(60)))?;
        }
        (None, Some(until)) if until > Utc::now() => state.control.mute_until(until),
        _ => {
            return Err(ApiError::BadRequest(
                "give either a positive `minutes` or a future `until`".to_string(),
            ))
        }
    }
    Ok(Json(MuteResponse::from_until(state.control.muted_until())))
}

pub async fn clear_mute(State(state): State<Arc<AppState>>) -> Json<MuteResponse> {
    state.control.unmute();
    Json(MuteResponse::from_until(None))
}
