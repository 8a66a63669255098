//! Store Contract

use crate::records::{DeployReport, ManualAction, MonitoredService, StatusChangeEvent};
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use status_normalizer::CanonicalStatus;

/// Durable state shared by the poll loop and the command side.
///
/// Writes that reference an unknown service create it first, so callers never
/// have to order "create" before "update".
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_service(&self, service_id: &str)
        -> Result<Option<MonitoredService>, StorageError>;

    async fn list_services(&self) -> Result<Vec<MonitoredService>, StorageError>;

    /// Services with monitoring, deploy notifications or log monitoring enabled
    async fn get_monitored_services(&self) -> Result<Vec<MonitoredService>, StorageError>;

    /// Enable monitoring; `baseline` seeds the stored status without alerting
    async fn enable_monitoring(
        &self,
        service_id: &str,
        name: Option<&str>,
        enabled_by: &str,
        baseline: Option<CanonicalStatus>,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Returns false when the service was never known
    async fn disable_monitoring(
        &self,
        service_id: &str,
        disabled_by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    async fn set_deploy_notifications(
        &self,
        service_id: &str,
        enabled: bool,
    ) -> Result<(), StorageError>;

    /// Toggle log scanning; `error_threshold: None` keeps the current one
    async fn set_log_monitoring(
        &self,
        service_id: &str,
        enabled: bool,
        error_threshold: Option<u32>,
    ) -> Result<(), StorageError>;

    /// Remember the outcome of the latest log scan
    async fn record_log_check(
        &self,
        service_id: &str,
        error_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn get_deploy_notifications_enabled(&self, service_id: &str)
        -> Result<bool, StorageError>;

    async fn update_status(
        &self,
        service_id: &str,
        status: CanonicalStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn record_status_change(&self, event: StatusChangeEvent) -> Result<(), StorageError>;

    /// Newest first
    async fn status_history(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<StatusChangeEvent>, StorageError>;

    async fn record_transient_status(
        &self,
        service_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Set or clear (`None`) an externally signalled deploy window
    async fn set_deploy_window(
        &self,
        service_id: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    async fn get_last_reported_deploy_id(
        &self,
        service_id: &str,
    ) -> Result<Option<String>, StorageError>;

    async fn is_deploy_reported(
        &self,
        service_id: &str,
        deploy_id: &str,
    ) -> Result<bool, StorageError>;

    /// Atomic insert-if-absent; returns true only for the first writer
    async fn record_reported_deploy(
        &self,
        service_id: &str,
        deploy_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Newest first
    async fn deploy_reports(&self, service_id: &str) -> Result<Vec<DeployReport>, StorageError>;

    /// Appends the audit record and stamps `last_our_action_at`
    async fn record_manual_action(&self, action: ManualAction) -> Result<(), StorageError>;

    async fn get_last_manual_action(
        &self,
        service_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Newest first
    async fn manual_actions(&self, service_id: &str) -> Result<Vec<ManualAction>, StorageError>;
}
