//! Persisted Records

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use status_normalizer::CanonicalStatus;
use std::fmt;
use std::str::FromStr;

/// Errors per log scan below which a non-critical batch stays quiet
pub const DEFAULT_LOG_ERROR_THRESHOLD: u32 = 5;

/// A service the monitor knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredService {
    pub service_id: String,
    /// Display name, falls back to the id
    pub name: String,
    /// `None` until the first successful observation
    pub last_known_status: Option<CanonicalStatus>,
    pub monitoring_enabled: bool,
    /// Destination of whoever enabled monitoring
    pub enabled_by: Option<String>,
    pub enabled_at: Option<DateTime<Utc>>,
    /// Independent of `monitoring_enabled`
    pub notify_on_deploy_enabled: bool,
    /// Last time this system itself changed the service's lifecycle
    pub last_our_action_at: Option<DateTime<Utc>>,
    /// Last time a build/deploy-in-progress status was observed
    pub last_transient_status_at: Option<DateTime<Utc>>,
    /// End of an externally signalled deploy window
    pub deploy_window_until: Option<DateTime<Utc>>,
    pub last_status_check_at: Option<DateTime<Utc>>,
    /// Scan recent logs for errors; independent of status monitoring
    pub log_monitoring_enabled: bool,
    pub log_error_threshold: u32,
    /// Errors found by the most recent log scan
    pub last_log_error_count: u32,
    pub last_log_check_at: Option<DateTime<Utc>>,
}

impl MonitoredService {
    /// A never-observed service with every flag off
    pub fn new(service_id: &str, name: Option<&str>) -> Self {
        Self {
            service_id: service_id.to_string(),
            name: name.unwrap_or(service_id).to_string(),
            last_known_status: None,
            monitoring_enabled: false,
            enabled_by: None,
            enabled_at: None,
            notify_on_deploy_enabled: false,
            last_our_action_at: None,
            last_transient_status_at: None,
            deploy_window_until: None,
            last_status_check_at: None,
            log_monitoring_enabled: false,
            log_error_threshold: DEFAULT_LOG_ERROR_THRESHOLD,
            last_log_error_count: 0,
            last_log_check_at: None,
        }
    }

    /// Whether the poll loop should visit this service
    pub fn is_polled(&self) -> bool {
        self.watches_status() || self.log_monitoring_enabled
    }

    /// Whether live status and deploys are read for this service
    pub fn watches_status(&self) -> bool {
        self.monitoring_enabled || self.notify_on_deploy_enabled
    }
}

/// Append-only status history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub service_id: String,
    pub old_status: CanonicalStatus,
    pub new_status: CanonicalStatus,
    /// Who observed the change, e.g. `poll`
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Dedup ledger entry; at most one per (service, deploy)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    pub service_id: String,
    pub deploy_id: String,
    pub status: String,
    pub reported_at: DateTime<Utc>,
}

/// Lifecycle change performed by this system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualActionKind {
    Suspend,
    Resume,
    AutoSuspend,
    Manual,
}

impl ManualActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualActionKind::Suspend => "suspend",
            ManualActionKind::Resume => "resume",
            ManualActionKind::AutoSuspend => "auto_suspend",
            ManualActionKind::Manual => "manual",
        }
    }
}

impl fmt::Display for ManualActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManualActionKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suspend" => Ok(ManualActionKind::Suspend),
            "resume" => Ok(ManualActionKind::Resume),
            "auto_suspend" => Ok(ManualActionKind::AutoSuspend),
            "manual" => Ok(ManualActionKind::Manual),
            other => Err(StorageError::Corrupt(format!("manual action kind {}", other))),
        }
    }
}

/// Durable audit record of a manual action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAction {
    pub service_id: String,
    pub kind: ManualActionKind,
    pub timestamp: DateTime<Utc>,
}
