//! Provider Error Types

use thiserror::Error;

/// Errors that can occur while querying a status provider.
///
/// "Service not found" is not an error; providers return `Ok(None)` for it.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// No answer within the per-call budget
    #[error("Timeout waiting for provider response after {0}ms")]
    Timeout(u64),

    /// Provider could not be reached or refused the request
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider answered with something we cannot interpret
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}
