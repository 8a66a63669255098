//! In-memory Store

use crate::records::{DeployReport, ManualAction, MonitoredService, StatusChangeEvent};
use crate::store::Store;
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use status_normalizer::CanonicalStatus;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Store kept entirely in process memory (tests and ephemeral runs)
pub struct MemoryStore {
    /// Services by id
    services: Mutex<HashMap<String, MonitoredService>>,
    /// Status history, oldest first
    history: Mutex<VecDeque<StatusChangeEvent>>,
    /// Deploy ledger, in insertion order
    reports: Mutex<Vec<DeployReport>>,
    /// Manual action audit trail, in insertion order
    actions: Mutex<Vec<ManualAction>>,
    /// Max history records kept across all services
    max_history_records: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        info!("Creating in-memory store");
        Self::with_history_limit(100_000)
    }

    /// Create an empty store keeping at most `limit` history records
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(1000)),
            reports: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            max_history_records: limit.max(1),
        }
    }

    fn with_service<R>(
        &self,
        service_id: &str,
        f: impl FnOnce(&mut MonitoredService) -> R,
    ) -> Result<R, StorageError> {
        let mut services = lock(&self.services)?;
        let service = services
            .entry(service_id.to_string())
            .or_insert_with(|| MonitoredService::new(service_id, None));
        Ok(f(service))
    }

    /// Total history records across all services
    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_service(
        &self,
        service_id: &str,
    ) -> Result<Option<MonitoredService>, StorageError> {
        Ok(lock(&self.services)?.get(service_id).cloned())
    }

    async fn list_services(&self) -> Result<Vec<MonitoredService>, StorageError> {
        let mut services: Vec<_> = lock(&self.services)?.values().cloned().collect();
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(services)
    }

    async fn get_monitored_services(&self) -> Result<Vec<MonitoredService>, StorageError> {
        let mut services = self.list_services().await?;
        services.retain(MonitoredService::is_polled);
        Ok(services)
    }

    async fn enable_monitoring(
        &self,
        service_id: &str,
        name: Option<&str>,
        enabled_by: &str,
        baseline: Option<CanonicalStatus>,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.monitoring_enabled = true;
            service.enabled_by = Some(enabled_by.to_string());
            service.enabled_at = Some(at);
            if let Some(name) = name {
                service.name = name.to_string();
            }
            if let Some(status) = baseline {
                service.last_known_status = Some(status);
            }
        })
    }

    async fn disable_monitoring(
        &self,
        service_id: &str,
        disabled_by: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut services = lock(&self.services)?;
        match services.get_mut(service_id) {
            Some(service) => {
                service.monitoring_enabled = false;
                debug!(service_id, disabled_by, "Monitoring disabled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_deploy_notifications(
        &self,
        service_id: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.notify_on_deploy_enabled = enabled;
        })
    }

    async fn set_log_monitoring(
        &self,
        service_id: &str,
        enabled: bool,
        error_threshold: Option<u32>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.log_monitoring_enabled = enabled;
            if let Some(threshold) = error_threshold {
                service.log_error_threshold = threshold;
            }
        })
    }

    async fn record_log_check(
        &self,
        service_id: &str,
        error_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.last_log_error_count = error_count;
            service.last_log_check_at = Some(at);
        })
    }

    async fn get_deploy_notifications_enabled(
        &self,
        service_id: &str,
    ) -> Result<bool, StorageError> {
        Ok(lock(&self.services)?
            .get(service_id)
            .map(|s| s.notify_on_deploy_enabled)
            .unwrap_or(false))
    }

    async fn update_status(
        &self,
        service_id: &str,
        status: CanonicalStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.last_known_status = Some(status);
            service.last_status_check_at = Some(at);
        })
    }

    async fn record_status_change(&self, event: StatusChangeEvent) -> Result<(), StorageError> {
        let mut history = lock(&self.history)?;

        // Enforce retention
        while history.len() >= self.max_history_records {
            history.pop_front();
        }

        history.push_back(event);
        Ok(())
    }

    async fn status_history(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<StatusChangeEvent>, StorageError> {
        let history = lock(&self.history)?;
        Ok(history
            .iter()
            .rev()
            .filter(|e| e.service_id == service_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_transient_status(
        &self,
        service_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.last_transient_status_at = Some(at);
        })
    }

    async fn set_deploy_window(
        &self,
        service_id: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.with_service(service_id, |service| {
            service.deploy_window_until = until;
        })
    }

    async fn get_last_reported_deploy_id(
        &self,
        service_id: &str,
    ) -> Result<Option<String>, StorageError> {
        let reports = lock(&self.reports)?;
        Ok(reports
            .iter()
            .rev()
            .find(|r| r.service_id == service_id)
            .map(|r| r.deploy_id.clone()))
    }

    async fn is_deploy_reported(
        &self,
        service_id: &str,
        deploy_id: &str,
    ) -> Result<bool, StorageError> {
        let reports = lock(&self.reports)?;
        Ok(reports
            .iter()
            .any(|r| r.service_id == service_id && r.deploy_id == deploy_id))
    }

    async fn record_reported_deploy(
        &self,
        service_id: &str,
        deploy_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        // Check and insert under one guard
        let mut reports = lock(&self.reports)?;
        if reports
            .iter()
            .any(|r| r.service_id == service_id && r.deploy_id == deploy_id)
        {
            return Ok(false);
        }
        reports.push(DeployReport {
            service_id: service_id.to_string(),
            deploy_id: deploy_id.to_string(),
            status: status.to_string(),
            reported_at: at,
        });
        Ok(true)
    }

    async fn deploy_reports(&self, service_id: &str) -> Result<Vec<DeployReport>, StorageError> {
        let reports = lock(&self.reports)?;
        Ok(reports
            .iter()
            .rev()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn record_manual_action(&self, action: ManualAction) -> Result<(), StorageError> {
        let at = action.timestamp;
        self.with_service(&action.service_id, |service| {
            service.last_our_action_at = Some(at);
        })?;
        lock(&self.actions)?.push(action);
        Ok(())
    }

    async fn get_last_manual_action(
        &self,
        service_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let actions = lock(&self.actions)?;
        Ok(actions
            .iter()
            .filter(|a| a.service_id == service_id)
            .map(|a| a.timestamp)
            .max())
    }

    async fn manual_actions(&self, service_id: &str) -> Result<Vec<ManualAction>, StorageError> {
        let actions = lock(&self.actions)?;
        Ok(actions
            .iter()
            .rev()
            .filter(|a| a.service_id == service_id)
            .cloned()
            .collect())
    }
}
