//! Shared Monitor State

use crate::alert::Alert;
use crate::config::MonitorConfig;
use alerting::{ManualActionCache, MuteSwitch, SeenLogCache, SuppressionPolicy};
use notify::{Destination, NotificationHub};
use provider::{StatusProvider, TimeoutProvider};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use storage::Store;
use tracing::{info, warn};

type DeployKey = (String, String);

/// Deploys whose alert is being delivered right now.
///
/// The ledger only records a deploy after delivery, so two tasks reading the
/// ledger at the same time would both send. Holding a claim across
/// check, dispatch and ledger write closes that gap.
#[derive(Debug, Clone, Default)]
pub struct InFlightDeploys {
    claims: Arc<Mutex<HashSet<DeployKey>>>,
}

impl InFlightDeploys {
    /// `None` while another task holds the same (service, deploy)
    pub fn claim(&self, service_id: &str, deploy_id: &str) -> Option<DeployClaim> {
        let key = (service_id.to_string(), deploy_id.to_string());
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        if !claims.insert(key.clone()) {
            return None;
        }
        Some(DeployClaim {
            claims: self.claims.clone(),
            key,
        })
    }
}

/// Released on drop, whatever the dispatch outcome
#[derive(Debug)]
pub struct DeployClaim {
    claims: Arc<Mutex<HashSet<DeployKey>>>,
    key: DeployKey,
}

impl Drop for DeployClaim {
    fn drop(&mut self) {
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        claims.remove(&self.key);
    }
}

/// Collaborators shared by the poll loop and the command side.
///
/// Cloning is cheap; every clone sees the same store, marks and mute.
#[derive(Clone)]
pub struct MonitorContext {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn StatusProvider>,
    pub hub: Arc<NotificationHub>,
    pub policy: SuppressionPolicy,
    pub marks: Arc<Mutex<ManualActionCache>>,
    pub mute: Arc<MuteSwitch>,
    pub in_flight: InFlightDeploys,
    pub seen_logs: Arc<Mutex<SeenLogCache>>,
    pub config: MonitorConfig,
}

impl MonitorContext {
    /// Provider reads are always bounded by `config.provider_timeout_secs`
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn StatusProvider>,
        hub: Arc<NotificationHub>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            provider: Arc::new(TimeoutProvider::new(provider, config.provider_timeout())),
            hub,
            policy: SuppressionPolicy::new(config.suppression()),
            marks: Arc::new(Mutex::new(ManualActionCache::new(config.manual_action_window()))),
            mute: Arc::new(MuteSwitch::new()),
            in_flight: InFlightDeploys::default(),
            seen_logs: Arc::new(Mutex::new(SeenLogCache::new(config.log_seen_capacity))),
            config,
        }
    }

    /// Manual-action marks; a poisoned lock still holds valid marks
    pub fn marks(&self) -> MutexGuard<'_, ManualActionCache> {
        self.marks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log lines already alerted on, per service
    pub fn seen_logs(&self) -> MutexGuard<'_, SeenLogCache> {
        self.seen_logs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an alert; true iff the admin acknowledged it
    pub async fn dispatch(&self, alert: &Alert, owner: Option<&str>) -> bool {
        let owner = owner.map(Destination::new);
        let confirmed = self.hub.deliver(&alert.render(), owner.as_ref()).await;
        if confirmed {
            metrics::counter!("monitor_alerts_sent_total", "kind" => alert.kind()).increment(1);
            info!(service_id = alert.service_id(), kind = alert.kind(), "Alert delivered");
        } else {
            metrics::counter!("monitor_alert_failures_total", "kind" => alert.kind()).increment(1);
            warn!(service_id = alert.service_id(), kind = alert.kind(), "Alert not delivered");
        }
        confirmed
    }
}
