//! Status Parse Error Types

use thiserror::Error;

/// Error returned when a stored canonical status string cannot be parsed back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized canonical status: {0}")]
pub struct StatusParseError(pub String);
