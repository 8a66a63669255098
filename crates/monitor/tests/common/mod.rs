//! Scripted collaborators for scheduler scenarios

use async_trait::async_trait;
use chrono::Utc;
use monitor::{MonitorConfig, MonitorContext, PollScheduler, ServiceControl};
use notify::{Destination, NotificationHub, Notifier, NotifyError};
use provider::{DeployDescriptor, LogEntry, ProviderError, StatusProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{MemoryStore, Store};

pub const ADMIN: &str = "admin";

/// Provider whose answers are set by the test between passes
#[derive(Default)]
pub struct ScriptedProvider {
    statuses: Mutex<HashMap<String, Result<Option<String>, ProviderError>>>,
    deploys: Mutex<HashMap<String, DeployDescriptor>>,
    logs: Mutex<HashMap<String, Vec<LogEntry>>>,
    status_calls: Mutex<Vec<(String, tokio::time::Instant)>>,
}

impl ScriptedProvider {
    pub fn set_status(&self, service_id: &str, raw: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(service_id.to_string(), Ok(Some(raw.to_string())));
    }

    pub fn set_missing(&self, service_id: &str) {
        self.statuses.lock().unwrap().insert(service_id.to_string(), Ok(None));
    }

    pub fn set_failing(&self, service_id: &str) {
        self.statuses.lock().unwrap().insert(
            service_id.to_string(),
            Err(ProviderError::Unavailable("scripted outage".to_string())),
        );
    }

    pub fn set_deploy(&self, service_id: &str, id: &str, status: &str, commit: Option<&str>) {
        self.deploys.lock().unwrap().insert(
            service_id.to_string(),
            DeployDescriptor {
                id: id.to_string(),
                status: status.to_string(),
                commit_message: commit.map(str::to_string),
            },
        );
    }

    /// Append log lines given as (id, text)
    pub fn push_logs(&self, service_id: &str, lines: &[(&str, &str)]) {
        self.logs
            .lock()
            .unwrap()
            .entry(service_id.to_string())
            .or_default()
            .extend(lines.iter().map(|(id, text)| LogEntry {
                id: id.to_string(),
                text: text.to_string(),
                timestamp: None,
                stream: None,
            }));
    }

    /// Times at which `get_status` was called for `service_id`
    pub fn status_calls(&self, service_id: &str) -> Vec<tokio::time::Instant> {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == service_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl StatusProvider for ScriptedProvider {
    async fn get_status(&self, service_id: &str) -> Result<Option<String>, ProviderError> {
        self.status_calls
            .lock()
            .unwrap()
            .push((service_id.to_string(), tokio::time::Instant::now()));
        self.statuses
            .lock()
            .unwrap()
            .get(service_id)
            .cloned()
            .unwrap_or(Ok(None))
    }

    async fn get_latest_deploy(
        &self,
        service_id: &str,
    ) -> Result<Option<DeployDescriptor>, ProviderError> {
        Ok(self.deploys.lock().unwrap().get(service_id).cloned())
    }

    async fn get_recent_logs(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, ProviderError> {
        let logs = self.logs.lock().unwrap();
        let lines = logs.get(service_id).cloned().unwrap_or_default();
        let skip = lines.len().saturating_sub(limit);
        Ok(lines.into_iter().skip(skip).collect())
    }
}

/// Notifier that records every send and answers from a script (default: ack)
#[derive(Default)]
pub struct ScriptedNotifier {
    answers: Mutex<VecDeque<bool>>,
    sent: Mutex<Vec<(String, String)>>,
    latency: Mutex<Duration>,
}

impl ScriptedNotifier {
    /// Every later send takes this long to answer
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn answer_next(&self, answers: &[bool]) {
        self.answers.lock().unwrap().extend(answers.iter().copied());
    }

    /// Messages sent to the admin, in order
    pub fn admin_messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(destination, _)| destination == ADMIN)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(d, _)| d.clone()).collect()
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    async fn send(&self, message: &str, destination: &Destination) -> Result<bool, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if destination.as_str() != ADMIN {
            return Ok(true);
        }
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(true))
    }
}

pub struct Harness {
    pub scheduler: PollScheduler,
    pub control: ServiceControl,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<ScriptedNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let notifier = Arc::new(ScriptedNotifier::default());
        let hub = Arc::new(NotificationHub::new(
            notifier.clone(),
            Destination::new(ADMIN),
            Duration::from_secs(5),
        ));
        let ctx = MonitorContext::new(store.clone(), provider.clone(), hub, config);
        Self {
            scheduler: PollScheduler::new(ctx.clone()),
            control: ServiceControl::new(ctx),
            store,
            provider,
            notifier,
        }
    }

    /// Register a service without a baseline
    pub async fn monitor(&self, service_id: &str, notify_on_deploy: bool) {
        self.store
            .enable_monitoring(service_id, None, ADMIN, None, Utc::now())
            .await
            .unwrap();
        self.store
            .set_deploy_notifications(service_id, notify_on_deploy)
            .await
            .unwrap();
    }

    pub async fn pass(&self) -> monitor::PassSummary {
        let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        self.scheduler.run_pass(&stop_rx).await
    }
}
