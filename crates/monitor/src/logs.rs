//! Log Error Scanning
//!
//! Reads the recent log tail of each log-monitored service, picks out error
//! lines not seen before and alerts on a batch when it holds a critical line
//! or reaches the service's error threshold. Lines are remembered as seen
//! when classified, so a batch below the threshold never alerts later.

use crate::alert::{Alert, MAX_LOG_SAMPLES};
use crate::context::MonitorContext;
use crate::MonitorError;
use chrono::Utc;
use status_normalizer::{classify_log_line, LogSeverity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use storage::MonitoredService;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of one log scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScan {
    /// Log monitoring is off for the service
    Disabled,
    /// Last scan attempt is younger than the check interval
    NotDue,
    Clean,
    /// New errors, but fewer than the threshold and none critical
    BelowThreshold(u32),
    Alerted(LogSeverity, u32),
    Muted(u32),
    /// Admin did not acknowledge; the lines stay marked as seen
    DispatchFailed(u32),
}

#[derive(Clone)]
pub struct LogScanner {
    ctx: MonitorContext,
    last_scan: Arc<Mutex<HashMap<String, Instant>>>,
}

impl LogScanner {
    pub fn new(ctx: MonitorContext) -> Self {
        Self {
            ctx,
            last_scan: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Claim this scan slot; false when the last scan is too recent
    fn take_slot(&self, service_id: &str) -> bool {
        let now = Instant::now();
        let interval = self.ctx.config.log_check_interval();
        let mut last_scan = self.last_scan.lock().unwrap_or_else(|e| e.into_inner());
        match last_scan.get(service_id) {
            Some(at) if now.duration_since(*at) < interval => false,
            _ => {
                last_scan.insert(service_id.to_string(), now);
                true
            }
        }
    }

    /// Scan the log tail of `service` once
    pub async fn scan(&self, service: &MonitoredService) -> Result<LogScan, MonitorError> {
        let service_id = service.service_id.as_str();
        if !service.log_monitoring_enabled {
            return Ok(LogScan::Disabled);
        }
        if !self.take_slot(service_id) {
            return Ok(LogScan::NotDue);
        }

        let lines = self
            .ctx
            .provider
            .get_recent_logs(service_id, self.ctx.config.log_tail_lines)
            .await?;

        let mut critical = Vec::new();
        let mut errors = Vec::new();
        {
            let mut seen = self.ctx.seen_logs();
            for line in &lines {
                if seen.contains(service_id, &line.id) {
                    continue;
                }
                let Some(severity) = classify_log_line(&line.text) else {
                    continue;
                };
                seen.insert(service_id, &line.id);
                match severity {
                    LogSeverity::Critical => critical.push(line.text.clone()),
                    LogSeverity::Error => errors.push(line.text.clone()),
                }
            }
            debug!(service_id, lines = lines.len(), remembered = seen.len(service_id), "Log tail scanned");
        }

        let found = u32::try_from(critical.len() + errors.len()).unwrap_or(u32::MAX);
        self.ctx
            .store
            .record_log_check(service_id, found, Utc::now())
            .await?;

        let (severity, batch) = if !critical.is_empty() {
            (LogSeverity::Critical, critical)
        } else if !errors.is_empty() && found >= service.log_error_threshold {
            (LogSeverity::Error, errors)
        } else if found == 0 {
            return Ok(LogScan::Clean);
        } else {
            return Ok(LogScan::BelowThreshold(found));
        };
        let count = u32::try_from(batch.len()).unwrap_or(u32::MAX);

        if self.ctx.mute.is_muted(Utc::now()) {
            metrics::counter!("monitor_alerts_suppressed_total", "veto" => "global_mute")
                .increment(1);
            info!(service_id, count, "Log alert muted");
            return Ok(LogScan::Muted(count));
        }

        let alert = Alert::LogErrors {
            service_id: service_id.to_string(),
            name: service.name.clone(),
            severity,
            count: batch.len(),
            samples: batch.into_iter().take(MAX_LOG_SAMPLES).collect(),
        };
        if self.ctx.dispatch(&alert, service.enabled_by.as_deref()).await {
            Ok(LogScan::Alerted(severity, count))
        } else {
            Ok(LogScan::DispatchFailed(count))
        }
    }
}
