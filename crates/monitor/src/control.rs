//! Service Control
//!
//! Command-side entry points. These run on request tasks next to the poll
//! loop and only perform single-service, idempotent writes.

use crate::context::MonitorContext;
use crate::deploy::{DeployDeduplicator, WatchOutcome};
use crate::MonitorError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use status_normalizer::{classify_deploy_status, normalize, CanonicalStatus};
use std::time::{Duration, Instant};
use storage::{ManualAction, ManualActionKind, MonitoredService, StatusChangeEvent};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Monitoring state of one service as shown to operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringStatus {
    pub service_id: String,
    pub name: String,
    pub monitoring_enabled: bool,
    pub notify_on_deploy_enabled: bool,
    pub last_known_status: Option<CanonicalStatus>,
    pub enabled_by: Option<String>,
    pub enabled_at: Option<DateTime<Utc>>,
    pub deploy_window_until: Option<DateTime<Utc>>,
    pub log_monitoring_enabled: bool,
    pub log_error_threshold: u32,
    pub last_log_error_count: u32,
    pub last_log_check_at: Option<DateTime<Utc>>,
}

impl From<MonitoredService> for MonitoringStatus {
    fn from(service: MonitoredService) -> Self {
        Self {
            service_id: service.service_id,
            name: service.name,
            monitoring_enabled: service.monitoring_enabled,
            notify_on_deploy_enabled: service.notify_on_deploy_enabled,
            last_known_status: service.last_known_status,
            enabled_by: service.enabled_by,
            enabled_at: service.enabled_at,
            deploy_window_until: service.deploy_window_until,
            log_monitoring_enabled: service.log_monitoring_enabled,
            log_error_threshold: service.log_error_threshold,
            last_log_error_count: service.last_log_error_count,
            last_log_check_at: service.last_log_check_at,
        }
    }
}

#[derive(Clone)]
pub struct ServiceControl {
    ctx: MonitorContext,
    deploys: DeployDeduplicator,
}

impl ServiceControl {
    pub fn new(ctx: MonitorContext) -> Self {
        let deploys = DeployDeduplicator::new(ctx.clone());
        Self { ctx, deploys }
    }

    pub fn context(&self) -> &MonitorContext {
        &self.ctx
    }

    /// Enable monitoring, seeding the stored status from a live read
    pub async fn enable_monitoring(
        &self,
        service_id: &str,
        name: Option<&str>,
        enabled_by: &str,
    ) -> Result<MonitoringStatus, MonitorError> {
        let baseline = match self.ctx.provider.get_status(service_id).await {
            Ok(Some(raw)) => Some(normalize(Some(&raw))),
            Ok(None) => None,
            Err(e) => {
                warn!(service_id, error = %e, "No baseline status, first poll will set it");
                None
            }
        };

        self.ctx
            .store
            .enable_monitoring(service_id, name, enabled_by, baseline, Utc::now())
            .await?;
        info!(service_id, enabled_by, baseline = ?baseline, "Monitoring enabled");
        self.require_status(service_id).await
    }

    /// Returns false for a service that was never known
    pub async fn disable_monitoring(
        &self,
        service_id: &str,
        disabled_by: &str,
    ) -> Result<bool, MonitorError> {
        let known = self
            .ctx
            .store
            .disable_monitoring(service_id, disabled_by, Utc::now())
            .await?;
        if known {
            info!(service_id, disabled_by, "Monitoring disabled");
        }
        Ok(known)
    }

    pub async fn set_deploy_notifications(
        &self,
        service_id: &str,
        enabled: bool,
    ) -> Result<MonitoringStatus, MonitorError> {
        self.ctx.store.set_deploy_notifications(service_id, enabled).await?;
        info!(service_id, enabled, "Deploy notifications updated");
        self.require_status(service_id).await
    }

    /// Toggle log scanning; disabling forgets the lines already seen
    pub async fn set_log_monitoring(
        &self,
        service_id: &str,
        enabled: bool,
        error_threshold: Option<u32>,
    ) -> Result<MonitoringStatus, MonitorError> {
        self.ctx
            .store
            .set_log_monitoring(service_id, enabled, error_threshold)
            .await?;
        if !enabled {
            self.ctx.seen_logs().forget(service_id);
        }
        info!(service_id, enabled, error_threshold = ?error_threshold, "Log monitoring updated");
        self.require_status(service_id).await
    }

    /// Record a lifecycle change we performed, in memory and durably
    pub async fn mark_manual_action(
        &self,
        service_id: &str,
        kind: ManualActionKind,
    ) -> Result<(), MonitorError> {
        self.ctx.marks().mark(service_id, Instant::now());
        self.ctx
            .store
            .record_manual_action(ManualAction {
                service_id: service_id.to_string(),
                kind,
                timestamp: Utc::now(),
            })
            .await?;
        info!(service_id, kind = %kind, "Manual action recorded");
        Ok(())
    }

    /// Mark a resume and watch the deploy it triggers until it finishes.
    ///
    /// A deploy that was already terminal before the resume is not reported
    /// by the watch.
    pub async fn resume_and_watch(
        &self,
        service_id: &str,
    ) -> Result<JoinHandle<Result<WatchOutcome, MonitorError>>, MonitorError> {
        if self.ctx.store.get_service(service_id).await?.is_none() {
            return Err(MonitorError::UnknownService(service_id.to_string()));
        }

        let ignore = match self.ctx.provider.get_latest_deploy(service_id).await {
            Ok(Some(deploy)) if classify_deploy_status(&deploy.status).is_some() => Some(deploy.id),
            Ok(_) => None,
            Err(e) => {
                warn!(service_id, error = %e, "Could not read current deploy before watch");
                None
            }
        };

        self.mark_manual_action(service_id, ManualActionKind::Resume).await?;

        let deploys = self.deploys.clone();
        let service_id = service_id.to_string();
        Ok(tokio::spawn(async move {
            deploys
                .watch_until_terminal(&service_id, ignore.as_deref())
                .await
        }))
    }

    pub fn mute_for(&self, duration: Duration) -> Result<DateTime<Utc>, MonitorError> {
        Ok(self.ctx.mute.mute_for(duration, Utc::now())?)
    }

    pub fn mute_until(&self, until: DateTime<Utc>) {
        self.ctx.mute.mute_until(until);
    }

    pub fn unmute(&self) {
        self.ctx.mute.unmute();
    }

    pub fn muted_until(&self) -> Option<DateTime<Utc>> {
        self.ctx.mute.muted_until(Utc::now())
    }

    /// Open a CI deploy window; an empty list means every known service
    pub async fn start_deploy_window(
        &self,
        service_ids: &[String],
        minutes: u64,
    ) -> Result<Vec<String>, MonitorError> {
        let until = i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .and_then(|window| Utc::now().checked_add_signed(window))
            .ok_or(MonitorError::InvalidWindow(minutes))?;

        let targets = self.targets(service_ids).await?;
        for service_id in &targets {
            self.ctx.store.set_deploy_window(service_id, Some(until)).await?;
        }
        info!(services = targets.len(), until = %until, "Deploy window started");
        Ok(targets)
    }

    /// Close a CI deploy window; an empty list means every known service
    pub async fn end_deploy_window(&self, service_ids: &[String]) -> Result<Vec<String>, MonitorError> {
        let targets = self.targets(service_ids).await?;
        for service_id in &targets {
            self.ctx.store.set_deploy_window(service_id, None).await?;
        }
        info!(services = targets.len(), "Deploy window ended");
        Ok(targets)
    }

    pub async fn monitoring_status(
        &self,
        service_id: &str,
    ) -> Result<Option<MonitoringStatus>, MonitorError> {
        Ok(self.ctx.store.get_service(service_id).await?.map(MonitoringStatus::from))
    }

    pub async fn list_services(&self) -> Result<Vec<MonitoringStatus>, MonitorError> {
        let services = self.ctx.store.list_services().await?;
        Ok(services.into_iter().map(MonitoringStatus::from).collect())
    }

    /// Newest first
    pub async fn history(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<StatusChangeEvent>, MonitorError> {
        Ok(self.ctx.store.status_history(service_id, limit).await?)
    }

    async fn require_status(&self, service_id: &str) -> Result<MonitoringStatus, MonitorError> {
        self.monitoring_status(service_id)
            .await?
            .ok_or_else(|| MonitorError::UnknownService(service_id.to_string()))
    }

    async fn targets(&self, service_ids: &[String]) -> Result<Vec<String>, MonitorError> {
        if !service_ids.is_empty() {
            return Ok(service_ids.to_vec());
        }
        let services = self.ctx.store.list_services().await?;
        Ok(services.into_iter().map(|s| s.service_id).collect())
    }
}
