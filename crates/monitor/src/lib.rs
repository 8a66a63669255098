//! Fleet Status Monitor
//!
//! The poll loop ([`PollScheduler`]) reads every monitored service through a
//! [`provider::StatusProvider`], normalizes the raw status, decides whether
//! the transition deserves an alert, and reports each finished deploy at most
//! once. Log-monitored services also get their recent log tail scanned for
//! new error lines. [`ServiceControl`] is the command side that shares the
//! same state.

mod alert;
mod config;
mod context;
mod control;
mod deploy;
mod error;
mod live;
mod logs;
mod scheduler;

pub use alert::{Alert, MAX_COMMIT_CHARS, MAX_LOG_LINE_CHARS, MAX_LOG_SAMPLES};
pub use config::MonitorConfig;
pub use context::MonitorContext;
pub use control::{MonitoringStatus, ServiceControl};
pub use deploy::{DeployCheck, DeployDeduplicator, WatchOutcome};
pub use error::MonitorError;
pub use live::{LiveOutcome, LiveStatusProcessor, POLL_SOURCE};
pub use logs::{LogScan, LogScanner};
pub use scheduler::{MonitorHandle, PassSummary, PollScheduler};
