//! Push-fed Status Provider

use crate::{DeployDescriptor, LogEntry, ProviderError, StatusProvider};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::debug;

/// Log lines kept per service
pub const MAX_PUSHED_LOG_LINES: usize = 1000;

#[derive(Debug, Default, Clone)]
struct PushedEntry {
    status: Option<String>,
    deploy: Option<DeployDescriptor>,
    logs: VecDeque<LogEntry>,
}

/// Serves the latest status and deploy pushed for each service.
///
/// Used when the hosting platform notifies us instead of being polled; the
/// scheduler still reads it through [`StatusProvider`] like any other source.
#[derive(Debug, Default)]
pub struct PushedStatusProvider {
    entries: RwLock<HashMap<String, PushedEntry>>,
}

impl PushedStatusProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest raw status for a service
    pub fn report_status(&self, service_id: &str, status: &str) -> Result<(), ProviderError> {
        let mut entries = self.entries.write().map_err(|e| {
            ProviderError::Unavailable(format!("Lock error: {}", e))
        })?;
        debug!(service_id, status, "Status pushed");
        entries.entry(service_id.to_string()).or_default().status = Some(status.to_string());
        Ok(())
    }

    /// Record the latest deployment for a service; the id is the dedup key
    /// and must not be blank
    pub fn report_deploy(
        &self,
        service_id: &str,
        deploy: DeployDescriptor,
    ) -> Result<(), ProviderError> {
        if deploy.id.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "deploy id must not be empty".to_string(),
            ));
        }
        let mut entries = self.entries.write().map_err(|e| {
            ProviderError::Unavailable(format!("Lock error: {}", e))
        })?;
        debug!(service_id, deploy_id = %deploy.id, status = %deploy.status, "Deploy pushed");
        entries.entry(service_id.to_string()).or_default().deploy = Some(deploy);
        Ok(())
    }

    /// Append log lines for a service, keeping the newest
    /// [`MAX_PUSHED_LOG_LINES`]. Lines need an id to be deduplicated later.
    pub fn report_logs(&self, service_id: &str, lines: Vec<LogEntry>) -> Result<(), ProviderError> {
        if lines.iter().any(|line| line.id.trim().is_empty()) {
            return Err(ProviderError::InvalidResponse(
                "log line id must not be empty".to_string(),
            ));
        }
        let mut entries = self.entries.write().map_err(|e| {
            ProviderError::Unavailable(format!("Lock error: {}", e))
        })?;
        debug!(service_id, lines = lines.len(), "Logs pushed");
        let logs = &mut entries.entry(service_id.to_string()).or_default().logs;
        logs.extend(lines);
        while logs.len() > MAX_PUSHED_LOG_LINES {
            logs.pop_front();
        }
        Ok(())
    }

    fn entry(&self, service_id: &str) -> Result<Option<PushedEntry>, ProviderError> {
        let entries = self.entries.read().map_err(|e| {
            ProviderError::Unavailable(format!("Lock error: {}", e))
        })?;
        Ok(entries.get(service_id).cloned())
    }
}

#[async_trait]
impl StatusProvider for PushedStatusProvider {
    async fn get_status(&self, service_id: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.entry(service_id)?.and_then(|e| e.status))
    }

    async fn get_latest_deploy(
        &self,
        service_id: &str,
    ) -> Result<Option<DeployDescriptor>, ProviderError> {
        Ok(self.entry(service_id)?.and_then(|e| e.deploy))
    }

    async fn get_recent_logs(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, ProviderError> {
        let Some(entry) = self.entry(service_id)? else {
            return Ok(Vec::new());
        };
        let skip = entry.logs.len().saturating_sub(limit);
        Ok(entry.logs.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_service_is_none() {
        let provider = PushedStatusProvider::new();
        assert_eq!(provider.get_status("srv-missing").await.unwrap(), None);
        assert_eq!(provider.get_latest_deploy("srv-missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_push_wins() {
        let provider = PushedStatusProvider::new();
        provider.report_status("srv-a", "deploying").unwrap();
        provider.report_status("srv-a", "live").unwrap();
        provider
            .report_deploy(
                "srv-a",
                DeployDescriptor {
                    id: "dep-1".to_string(),
                    status: "live".to_string(),
                    commit_message: None,
                },
            )
            .unwrap();

        assert_eq!(provider.get_status("srv-a").await.unwrap().as_deref(), Some("live"));
        let deploy = provider.get_latest_deploy("srv-a").await.unwrap().unwrap();
        assert_eq!(deploy.id, "dep-1");
    }

    fn line(id: &str) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            text: format!("line {}", id),
            timestamp: None,
            stream: Some("stderr".to_string()),
        }
    }

    #[tokio::test]
    async fn test_recent_logs_are_the_newest_tail() {
        let provider = PushedStatusProvider::new();
        provider
            .report_logs("srv-a", (0..5).map(|i| line(&i.to_string())).collect())
            .unwrap();

        let tail = provider.get_recent_logs("srv-a", 2).await.unwrap();
        let ids: Vec<_> = tail.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
        assert!(provider.get_recent_logs("srv-b", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pushed_logs_are_bounded() {
        let provider = PushedStatusProvider::new();
        let lines = (0..MAX_PUSHED_LOG_LINES + 10).map(|i| line(&i.to_string())).collect();
        provider.report_logs("srv-a", lines).unwrap();

        let all = provider.get_recent_logs("srv-a", usize::MAX).await.unwrap();
        assert_eq!(all.len(), MAX_PUSHED_LOG_LINES);
        assert_eq!(all[0].id, "10");
        assert!(provider.report_logs("srv-a", vec![line(" ")]).is_err());
    }

    #[tokio::test]
    async fn test_deploy_without_id_rejected() {
        let provider = PushedStatusProvider::new();
        let err = provider
            .report_deploy(
                "srv-a",
                DeployDescriptor {
                    id: "  ".to_string(),
                    status: "live".to_string(),
                    commit_message: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
        assert_eq!(provider.get_latest_deploy("srv-a").await.unwrap(), None);
    }
}
