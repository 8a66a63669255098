//! Per-call Timeout Decorator

use crate::{DeployDescriptor, LogEntry, ProviderError, StatusProvider};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Bounds every provider call so a hanging platform cannot stall a poll pass
pub struct TimeoutProvider {
    inner: Arc<dyn StatusProvider>,
    timeout: Duration,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn StatusProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        service_id: &str,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        match timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(service_id, op, timeout_ms = self.timeout.as_millis() as u64, "Provider call timed out");
                Err(ProviderError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

#[async_trait]
impl StatusProvider for TimeoutProvider {
    async fn get_status(&self, service_id: &str) -> Result<Option<String>, ProviderError> {
        self.bounded("get_status", service_id, self.inner.get_status(service_id))
            .await
    }

    async fn get_latest_deploy(
        &self,
        service_id: &str,
    ) -> Result<Option<DeployDescriptor>, ProviderError> {
        self.bounded(
            "get_latest_deploy",
            service_id,
            self.inner.get_latest_deploy(service_id),
        )
        .await
    }

    async fn get_recent_logs(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, ProviderError> {
        self.bounded(
            "get_recent_logs",
            service_id,
            self.inner.get_recent_logs(service_id, limit),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PushedStatusProvider;

    struct HangingProvider;

    #[async_trait]
    impl StatusProvider for HangingProvider {
        async fn get_status(&self, _service_id: &str) -> Result<Option<String>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Some("live".to_string()))
        }

        async fn get_latest_deploy(
            &self,
            _service_id: &str,
        ) -> Result<Option<DeployDescriptor>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_call_times_out() {
        let provider = TimeoutProvider::new(Arc::new(HangingProvider), Duration::from_secs(15));
        let err = provider.get_status("srv-a").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(15000)));
        assert!(provider.get_latest_deploy("srv-a").await.is_err());
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let inner = Arc::new(PushedStatusProvider::new());
        inner.report_status("srv-a", "live").unwrap();
        inner
            .report_logs(
                "srv-a",
                vec![LogEntry {
                    id: "l-1".to_string(),
                    text: "boot".to_string(),
                    timestamp: None,
                    stream: None,
                }],
            )
            .unwrap();
        let provider = TimeoutProvider::new(inner, Duration::from_secs(1));
        assert_eq!(provider.get_status("srv-a").await.unwrap().as_deref(), Some("live"));
        assert_eq!(provider.get_recent_logs("srv-a", 10).await.unwrap().len(), 1);
    }
}
