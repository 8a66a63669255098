//! Deploy Event Deduplication
//!
//! Terminal deploy outcomes are detected independently of the polled live
//! status and reported at most once per (service, deploy). The ledger row is
//! written only after the admin confirmed delivery, so a failed dispatch is
//! retried on the next cycle. An in-flight claim keeps the poll pass and a
//! deploy watch from delivering the same deploy concurrently.

use crate::alert::Alert;
use crate::context::MonitorContext;
use crate::MonitorError;
use chrono::Utc;
use provider::DeployDescriptor;
use status_normalizer::{classify_commit, classify_deploy_status};
use storage::MonitoredService;
use tracing::{debug, info, warn};

/// Result of one deploy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployCheck {
    /// Deploy notifications are off for the service
    Disabled,
    NoDeploy,
    AlreadyReported,
    /// Latest deploy has not reached a terminal status yet
    InProgress,
    /// Another task is delivering this deploy right now
    InFlight,
    /// Alert confirmed and ledger written
    Reported,
    /// Muted; ledger written without sending
    Suppressed,
    /// Admin did not acknowledge; retried next cycle
    DispatchFailed,
}

/// Outcome of watching a single deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The watched deploy turned terminal; carries what the gate decided
    Finished(DeployCheck),
    /// Still not terminal when the watch budget ran out
    TimedOut,
}

#[derive(Clone)]
pub struct DeployDeduplicator {
    ctx: MonitorContext,
}

impl DeployDeduplicator {
    pub fn new(ctx: MonitorContext) -> Self {
        Self { ctx }
    }

    /// Per-cycle check of the latest deploy of `service`
    pub async fn check_deploy_event(
        &self,
        service: &MonitoredService,
    ) -> Result<DeployCheck, MonitorError> {
        if !service.notify_on_deploy_enabled {
            return Ok(DeployCheck::Disabled);
        }
        match self.ctx.provider.get_latest_deploy(&service.service_id).await? {
            Some(deploy) => self.report_if_terminal(service, &deploy).await,
            None => Ok(DeployCheck::NoDeploy),
        }
    }

    /// Report `deploy` once if it is terminal and not yet in the ledger
    pub async fn report_if_terminal(
        &self,
        service: &MonitoredService,
        deploy: &DeployDescriptor,
    ) -> Result<DeployCheck, MonitorError> {
        let service_id = service.service_id.as_str();
        if deploy.id.is_empty() {
            return Ok(DeployCheck::NoDeploy);
        }
        if self.already_reported(service_id, &deploy.id).await? {
            return Ok(DeployCheck::AlreadyReported);
        }
        let Some(outcome) = classify_deploy_status(&deploy.status) else {
            debug!(service_id, deploy_id = %deploy.id, status = %deploy.status, "Deploy not terminal");
            return Ok(DeployCheck::InProgress);
        };

        let Some(_claim) = self.ctx.in_flight.claim(service_id, &deploy.id) else {
            debug!(service_id, deploy_id = %deploy.id, "Deploy being reported elsewhere");
            return Ok(DeployCheck::InFlight);
        };
        // The previous holder may have written the ledger after our first read
        if self.already_reported(service_id, &deploy.id).await? {
            return Ok(DeployCheck::AlreadyReported);
        }

        let now = Utc::now();
        if self.ctx.mute.is_muted(now) {
            metrics::counter!("monitor_alerts_suppressed_total", "veto" => "global_mute")
                .increment(1);
            self.ctx
                .store
                .record_reported_deploy(service_id, &deploy.id, &deploy.status, now)
                .await?;
            info!(service_id, deploy_id = %deploy.id, "Deploy alert muted");
            return Ok(DeployCheck::Suppressed);
        }

        let alert = Alert::Deploy {
            service_id: service_id.to_string(),
            name: service.name.clone(),
            deploy_id: deploy.id.clone(),
            status: deploy.status.clone(),
            outcome,
            change: classify_commit(deploy.commit_message.as_deref()),
            commit_message: deploy.commit_message.clone(),
        };
        if !self.ctx.dispatch(&alert, service.enabled_by.as_deref()).await {
            return Ok(DeployCheck::DispatchFailed);
        }

        let inserted = self
            .ctx
            .store
            .record_reported_deploy(service_id, &deploy.id, &deploy.status, Utc::now())
            .await?;
        if !inserted {
            debug!(service_id, deploy_id = %deploy.id, "Deploy already in ledger");
        }
        info!(service_id, deploy_id = %deploy.id, outcome = ?outcome, "Deploy reported");
        Ok(DeployCheck::Reported)
    }

    async fn already_reported(&self, service_id: &str, deploy_id: &str) -> Result<bool, MonitorError> {
        let last = self.ctx.store.get_last_reported_deploy_id(service_id).await?;
        if last.as_deref() == Some(deploy_id) {
            return Ok(true);
        }
        Ok(self.ctx.store.is_deploy_reported(service_id, deploy_id).await?)
    }

    /// Poll one service's latest deploy until it turns terminal.
    ///
    /// `ignore_deploy_id` is a deploy that was already current when the watch
    /// started; it is skipped so only a newer deploy is reported. Gives up
    /// silently after the configured watch timeout.
    pub async fn watch_until_terminal(
        &self,
        service_id: &str,
        ignore_deploy_id: Option<&str>,
    ) -> Result<WatchOutcome, MonitorError> {
        let interval = self.ctx.config.deploy_watch_interval();
        let budget = self.ctx.config.deploy_watch_timeout();
        info!(service_id, timeout_secs = budget.as_secs(), "Watching deploy");

        let watch = async {
            loop {
                if let Some(check) = self.watch_step(service_id, ignore_deploy_id).await? {
                    return Ok::<_, MonitorError>(WatchOutcome::Finished(check));
                }
                tokio::time::sleep(interval).await;
            }
        };

        match tokio::time::timeout(budget, watch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(service_id, "Deploy watch timed out");
                Ok(WatchOutcome::TimedOut)
            }
        }
    }

    /// One watch poll; `Some` once the watched deploy is settled
    async fn watch_step(
        &self,
        service_id: &str,
        ignore_deploy_id: Option<&str>,
    ) -> Result<Option<DeployCheck>, MonitorError> {
        let service = self
            .ctx
            .store
            .get_service(service_id)
            .await?
            .ok_or_else(|| MonitorError::UnknownService(service_id.to_string()))?;

        let deploy = match self.ctx.provider.get_latest_deploy(service_id).await {
            Ok(Some(deploy)) => deploy,
            Ok(None) => return Ok(None),
            Err(e) => {
                metrics::counter!("monitor_provider_errors_total").increment(1);
                warn!(service_id, error = %e, "Deploy watch poll failed");
                return Ok(None);
            }
        };
        if ignore_deploy_id == Some(deploy.id.as_str()) {
            return Ok(None);
        }

        match self.report_if_terminal(&service, &deploy).await? {
            DeployCheck::InProgress | DeployCheck::NoDeploy | DeployCheck::InFlight => Ok(None),
            DeployCheck::DispatchFailed => Ok(None),
            settled => Ok(Some(settled)),
        }
    }
}
