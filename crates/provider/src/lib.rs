//! Status Provider Contract
//!
//! The monitor needs three reads from the hosting platform: the raw live
//! status of a service, its most recent deployment and its recent log lines.
//! Concrete vendor clients
//! live outside this workspace; [`PushedStatusProvider`] serves statuses that
//! are pushed in over the HTTP intake.

mod error;
mod pushed;
mod timeout;

pub use error::ProviderError;
pub use pushed::{PushedStatusProvider, MAX_PUSHED_LOG_LINES};
pub use timeout::TimeoutProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Most recent deployment attempt for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployDescriptor {
    /// Provider-assigned deploy id
    pub id: String,
    /// Raw vendor deploy status
    pub status: String,
    /// Commit message of the deployed revision, when known
    #[serde(default)]
    pub commit_message: Option<String>,
}

/// One line of service output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Provider-assigned line id, stable across reads
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// `stdout` or `stderr` when the platform says
    #[serde(default)]
    pub stream: Option<String>,
}

/// Read-only view of the hosting platform
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Raw vendor status of a service, `None` when the service is unknown
    async fn get_status(&self, service_id: &str) -> Result<Option<String>, ProviderError>;

    /// Latest deployment of a service, `None` when there is none
    async fn get_latest_deploy(
        &self,
        service_id: &str,
    ) -> Result<Option<DeployDescriptor>, ProviderError>;

    /// Up to `limit` most recent log lines, oldest first.
    ///
    /// Platforms without log access keep the default and return nothing.
    async fn get_recent_logs(
        &self,
        _service_id: &str,
        _limit: usize,
    ) -> Result<Vec<LogEntry>, ProviderError> {
        Ok(Vec::new())
    }
}
