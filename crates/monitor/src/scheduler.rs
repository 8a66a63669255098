//! Poll Scheduler Implementation
//!
//! One background task visits every monitored service per pass, strictly in
//! sequence, then sleeps for an interval chosen from what the pass saw.

use crate::config::MonitorConfig;
use crate::context::MonitorContext;
use crate::deploy::{DeployCheck, DeployDeduplicator};
use crate::live::{LiveOutcome, LiveStatusProcessor};
use crate::logs::{LogScan, LogScanner};
use crate::MonitorError;
use std::time::{Duration, Instant};
use storage::MonitoredService;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What one pass observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Services fully processed
    pub processed: usize,
    /// Services skipped because of a provider or storage failure
    pub failed: usize,
    /// Some service was observed deploying
    pub saw_deploying: bool,
    /// Some visited service has deploy notifications enabled
    pub deploy_notifications: bool,
    /// Log scans that sent an alert
    pub log_alerts: usize,
    /// Stop was requested before the pass finished
    pub stopped: bool,
}

impl PassSummary {
    /// Short interval while deploys matter, otherwise the base interval
    pub fn next_interval(&self, config: &MonitorConfig) -> Duration {
        if self.saw_deploying || self.deploy_notifications {
            config.deploy_interval()
        } else {
            config.base_interval()
        }
    }
}

/// Fleet-wide poll loop; the only writer of canonical status and the ledger
#[derive(Clone)]
pub struct PollScheduler {
    ctx: MonitorContext,
    live: LiveStatusProcessor,
    deploys: DeployDeduplicator,
    logs: LogScanner,
}

/// Everything one service visit produced
#[derive(Debug)]
struct ServiceVisit {
    /// `None` for log-only services
    live: Option<LiveOutcome>,
    deploy: DeployCheck,
    logs: LogScan,
}

impl PollScheduler {
    pub fn new(ctx: MonitorContext) -> Self {
        let deploys = DeployDeduplicator::new(ctx.clone());
        let live = LiveStatusProcessor::new(ctx.clone(), deploys.clone());
        let logs = LogScanner::new(ctx.clone());
        Self {
            ctx,
            live,
            deploys,
            logs,
        }
    }

    /// Visit every monitored service once.
    ///
    /// Failures are contained per service. Stop is observed between services.
    pub async fn run_pass(&self, stop: &watch::Receiver<bool>) -> PassSummary {
        let mut summary = PassSummary::default();
        self.ctx.marks().purge(Instant::now());

        let services = match self.ctx.store.get_monitored_services().await {
            Ok(services) => services,
            Err(e) => {
                error!("Failed to load monitored services: {}", e);
                summary.failed += 1;
                return summary;
            }
        };

        for service in &services {
            if *stop.borrow() {
                summary.stopped = true;
                break;
            }
            summary.deploy_notifications |= service.notify_on_deploy_enabled;

            match self.process_service(service).await {
                Ok(visit) => {
                    summary.processed += 1;
                    summary.saw_deploying |= visit.live.is_some_and(|l| l.status().is_transient());
                    if matches!(visit.logs, LogScan::Alerted(..)) {
                        summary.log_alerts += 1;
                    }
                    debug!(
                        service_id = %service.service_id,
                        live = ?visit.live,
                        deploy = ?visit.deploy,
                        logs = ?visit.logs,
                        "Service processed"
                    );
                }
                Err(MonitorError::Provider(e)) => {
                    summary.failed += 1;
                    metrics::counter!("monitor_provider_errors_total").increment(1);
                    warn!(service_id = %service.service_id, error = %e, "Provider failed, skipping service");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(service_id = %service.service_id, error = %e, "Service processing failed");
                }
            }
        }

        summary
    }

    async fn process_service(&self, service: &MonitoredService) -> Result<ServiceVisit, MonitorError> {
        let live = if service.watches_status() {
            Some(self.live.process(service).await?)
        } else {
            None
        };
        let deploy = self.deploys.check_deploy_event(service).await?;
        let logs = self.logs.scan(service).await?;
        Ok(ServiceVisit { live, deploy, logs })
    }

    /// Run passes until `stop` flips to true or its sender is dropped
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!("Starting poll scheduler");

        loop {
            if *stop.borrow() {
                break;
            }

            let summary = self.run_pass(&stop).await;
            metrics::counter!("monitor_passes_total").increment(1);
            if summary.stopped {
                break;
            }

            let interval = summary.next_interval(&self.ctx.config);
            debug!(
                processed = summary.processed,
                failed = summary.failed,
                interval_secs = interval.as_secs(),
                "Pass complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Poll scheduler stopped");
    }

    /// Spawn the loop on the runtime
    pub fn spawn(self) -> MonitorHandle {
        let stop_timeout = self.ctx.config.stop_timeout();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        MonitorHandle {
            stop_tx,
            task,
            stop_timeout,
        }
    }
}

/// Owner handle of a spawned poll loop
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    stop_timeout: Duration,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal stop and wait for the loop, at most the configured join timeout
    pub async fn stop(self) -> Result<(), MonitorError> {
        info!("Stopping poll scheduler");
        let _ = self.stop_tx.send(true);

        let mut task = self.task;
        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MonitorError::Shutdown(e.to_string())),
            Err(_) => {
                task.abort();
                Err(MonitorError::Shutdown(format!(
                    "not stopped within {}s",
                    self.stop_timeout.as_secs()
                )))
            }
        }
    }
}
