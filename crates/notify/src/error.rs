//! Notify Error Types

use thiserror::Error;

/// Errors raised while delivering a message.
///
/// Callers treat every error the same as an unacknowledged delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport failure talking to the delivery endpoint
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Notify: delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// No acknowledgement within the per-call budget
    #[error("Notify: timed out after {0}ms")]
    Timeout(u64),

    #[error("Notify: {0}")]
    Other(String),
}
