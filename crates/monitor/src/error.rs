//! Monitor Error Types

use alerting::MuteError;
use provider::ProviderError;
use storage::StorageError;
use thiserror::Error;

/// Errors that abort processing of a single service or command
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Deploy window of {0} minutes is out of range")]
    InvalidWindow(u64),

    #[error(transparent)]
    Mute(#[from] MuteError),

    #[error("Monitor task failed to stop: {0}")]
    Shutdown(String),
}
