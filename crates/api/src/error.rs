//! API Error Responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use monitor::MonitorError;
use provider::ProviderError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Monitor(MonitorError::UnknownService(_)) => StatusCode::NOT_FOUND,
            ApiError::Monitor(MonitorError::InvalidWindow(_) | MonitorError::Mute(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Provider(ProviderError::InvalidResponse(_)) => StatusCode::BAD_REQUEST,
            ApiError::Monitor(_) | ApiError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
