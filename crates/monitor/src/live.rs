//! Live Status Processing

use crate::alert::Alert;
use crate::context::MonitorContext;
use crate::deploy::{DeployCheck, DeployDeduplicator};
use crate::MonitorError;
use alerting::{
    classify_transition, is_significant, SignificanceConfig, SuppressionContext, Veto,
};
use chrono::Utc;
use status_normalizer::{normalize, CanonicalStatus};
use std::time::Instant;
use storage::{MonitoredService, StatusChangeEvent};
use tracing::{debug, warn};

/// Source tag for changes observed by the poll loop
pub const POLL_SOURCE: &str = "poll";

/// What happened to one live observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// First observation; stored without alerting
    Baseline(CanonicalStatus),
    Unchanged(CanonicalStatus),
    /// Changed, but not an alertable transition
    Recorded(CanonicalStatus),
    Alerted(CanonicalStatus),
    Suppressed(CanonicalStatus, Veto),
    /// Deploy outcome routed through the deploy ledger
    DeployGate(CanonicalStatus, DeployCheck),
    /// Admin did not acknowledge the alert
    DispatchFailed(CanonicalStatus),
}

impl LiveOutcome {
    pub fn status(&self) -> CanonicalStatus {
        match *self {
            LiveOutcome::Baseline(s)
            | LiveOutcome::Unchanged(s)
            | LiveOutcome::Recorded(s)
            | LiveOutcome::Alerted(s)
            | LiveOutcome::Suppressed(s, _)
            | LiveOutcome::DeployGate(s, _)
            | LiveOutcome::DispatchFailed(s) => s,
        }
    }
}

/// Turns one raw provider status into history, alerts and stored state
#[derive(Clone)]
pub struct LiveStatusProcessor {
    ctx: MonitorContext,
    deploys: DeployDeduplicator,
}

impl LiveStatusProcessor {
    pub fn new(ctx: MonitorContext, deploys: DeployDeduplicator) -> Self {
        Self { ctx, deploys }
    }

    /// Read, classify, maybe alert and persist the live status of `service`.
    ///
    /// A provider failure leaves the stored status untouched.
    pub async fn process(&self, service: &MonitoredService) -> Result<LiveOutcome, MonitorError> {
        let raw = self.ctx.provider.get_status(&service.service_id).await?;
        self.apply(service, raw.as_deref()).await
    }

    /// Apply an already fetched raw status
    pub async fn apply(
        &self,
        service: &MonitoredService,
        raw: Option<&str>,
    ) -> Result<LiveOutcome, MonitorError> {
        let service_id = service.service_id.as_str();
        let new = normalize(raw);
        let now = Utc::now();

        if new.is_transient() {
            self.ctx.store.record_transient_status(service_id, now).await?;
        }

        let outcome = match service.last_known_status {
            None => {
                debug!(service_id, status = %new, "Baseline status");
                LiveOutcome::Baseline(new)
            }
            Some(old) if old == new => LiveOutcome::Unchanged(new),
            Some(old) => {
                self.ctx
                    .store
                    .record_status_change(StatusChangeEvent {
                        service_id: service_id.to_string(),
                        old_status: old,
                        new_status: new,
                        source: POLL_SOURCE.to_string(),
                        timestamp: now,
                    })
                    .await?;
                self.alert_transition(service, old, new).await?
            }
        };

        self.ctx.store.update_status(service_id, new, now).await?;
        Ok(outcome)
    }

    async fn alert_transition(
        &self,
        service: &MonitoredService,
        old: CanonicalStatus,
        new: CanonicalStatus,
    ) -> Result<LiveOutcome, MonitorError> {
        let config = SignificanceConfig {
            notify_on_deploy_enabled: service.notify_on_deploy_enabled,
        };
        let Some(kind) = classify_transition(old, new).filter(|_| is_significant(Some(old), new, config))
        else {
            return Ok(LiveOutcome::Recorded(new));
        };

        let ctx = SuppressionContext {
            service_id: &service.service_id,
            old,
            new,
            last_our_action_at: service.last_our_action_at,
            last_transient_status_at: service.last_transient_status_at,
            deploy_window_until: service.deploy_window_until,
            now: Utc::now(),
            instant: Instant::now(),
        };
        let veto = {
            let marks = self.ctx.marks();
            self.ctx.policy.check(&ctx, &marks, &self.ctx.mute)
        };
        if let Some(veto) = veto {
            metrics::counter!("monitor_alerts_suppressed_total", "veto" => veto.as_str())
                .increment(1);
            return Ok(LiveOutcome::Suppressed(new, veto));
        }

        if kind.is_deploy_outcome() {
            if let Some(check) = self.deploy_gate(service).await? {
                return Ok(LiveOutcome::DeployGate(new, check));
            }
        }

        let alert = Alert::StatusChange {
            service_id: service.service_id.clone(),
            name: service.name.clone(),
            old,
            new,
            kind,
        };
        if self.ctx.dispatch(&alert, service.enabled_by.as_deref()).await {
            Ok(LiveOutcome::Alerted(new))
        } else {
            Ok(LiveOutcome::DispatchFailed(new))
        }
    }

    /// Route a finished deploy through the ledger when the provider knows it.
    ///
    /// A deploy the ledger already holds only absorbs the transition when it
    /// was reported during the current deploying episode; an older deploy
    /// says nothing about why the service just left `deploying`.
    async fn deploy_gate(&self, service: &MonitoredService) -> Result<Option<DeployCheck>, MonitorError> {
        let deploy = match self.ctx.provider.get_latest_deploy(&service.service_id).await {
            Ok(Some(deploy)) => deploy,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(service_id = %service.service_id, error = %e, "Deploy lookup failed, sending plain alert");
                return Ok(None);
            }
        };
        match self.deploys.report_if_terminal(service, &deploy).await? {
            DeployCheck::InProgress | DeployCheck::NoDeploy => Ok(None),
            DeployCheck::AlreadyReported if !self.reported_this_episode(service, &deploy.id).await? => {
                debug!(service_id = %service.service_id, deploy_id = %deploy.id, "Deploy predates episode, sending plain alert");
                Ok(None)
            }
            check => Ok(Some(check)),
        }
    }

    /// Whether `deploy_id` entered the ledger at or after the last time the
    /// service was seen deploying, as of the start of this pass
    async fn reported_this_episode(
        &self,
        service: &MonitoredService,
        deploy_id: &str,
    ) -> Result<bool, MonitorError> {
        let Some(since) = service.last_transient_status_at else {
            return Ok(false);
        };
        let reports = self.ctx.store.deploy_reports(&service.service_id).await?;
        Ok(reports
            .iter()
            .any(|report| report.deploy_id == deploy_id && report.reported_at >= since))
    }
}
