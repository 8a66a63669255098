//! Monitor Configuration

use alerting::SuppressionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Poll cadence, suppression windows and timeouts, in whole seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between passes when nothing is deploying (default: 60)
    pub base_interval_secs: u64,
    /// Sleep between passes while deploys matter (default: 15)
    pub deploy_interval_secs: u64,
    /// Manual-action suppression window (default: 300)
    pub manual_action_window_secs: u64,
    /// Transient/deploy observation suppression window (default: 600)
    pub transient_window_secs: u64,
    /// Per-call budget for provider reads (default: 15)
    pub provider_timeout_secs: u64,
    /// Per-call budget for notifier sends (default: 15)
    pub notify_timeout_secs: u64,
    /// Poll interval of a single-deploy watch (default: 10)
    pub deploy_watch_interval_secs: u64,
    /// Give up on a single-deploy watch after this long (default: 900)
    pub deploy_watch_timeout_secs: u64,
    /// Bound on waiting for the poll task to stop (default: 5)
    pub stop_timeout_secs: u64,
    /// Minimum time between two log scans of one service (default: 60)
    pub log_check_interval_secs: u64,
    /// Log lines read per scan (default: 500)
    pub log_tail_lines: usize,
    /// Error line ids remembered per service (default: 1000)
    pub log_seen_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: 60,
            deploy_interval_secs: 15,
            manual_action_window_secs: 300,
            transient_window_secs: 600,
            provider_timeout_secs: 15,
            notify_timeout_secs: 15,
            deploy_watch_interval_secs: 10,
            deploy_watch_timeout_secs: 900,
            stop_timeout_secs: 5,
            log_check_interval_secs: 60,
            log_tail_lines: 500,
            log_seen_capacity: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    pub fn deploy_interval(&self) -> Duration {
        Duration::from_secs(self.deploy_interval_secs)
    }

    pub fn manual_action_window(&self) -> Duration {
        Duration::from_secs(self.manual_action_window_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn deploy_watch_interval(&self) -> Duration {
        Duration::from_secs(self.deploy_watch_interval_secs)
    }

    pub fn deploy_watch_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_watch_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn log_check_interval(&self) -> Duration {
        Duration::from_secs(self.log_check_interval_secs)
    }

    /// Windows for the suppression policy; one manual-action window everywhere
    pub fn suppression(&self) -> SuppressionConfig {
        SuppressionConfig {
            manual_action_window: self.manual_action_window(),
            transient_window: Duration::from_secs(self.transient_window_secs),
        }
    }
}
