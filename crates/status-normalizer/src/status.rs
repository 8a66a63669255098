//! Canonical Status

use crate::error::StatusParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simplified availability state of a monitored service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    /// Never observed, or the raw status could not be classified
    #[default]
    Unknown,
    /// Serving traffic
    Online,
    /// Suspended, stopped or failed
    Offline,
    /// Build or deploy in progress
    Deploying,
}

impl CanonicalStatus {
    /// All canonical states, in declaration order
    pub const ALL: [CanonicalStatus; 4] = [
        CanonicalStatus::Unknown,
        CanonicalStatus::Online,
        CanonicalStatus::Offline,
        CanonicalStatus::Deploying,
    ];

    /// Lowercase name used for persistence and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Unknown => "unknown",
            CanonicalStatus::Online => "online",
            CanonicalStatus::Offline => "offline",
            CanonicalStatus::Deploying => "deploying",
        }
    }

    /// Whether this state marks a build/deploy in progress
    pub fn is_transient(&self) -> bool {
        matches!(self, CanonicalStatus::Deploying)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(CanonicalStatus::Unknown),
            "online" => Ok(CanonicalStatus::Online),
            "offline" => Ok(CanonicalStatus::Offline),
            "deploying" => Ok(CanonicalStatus::Deploying),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}
