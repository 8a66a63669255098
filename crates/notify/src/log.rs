//! Log-only Notifier

use crate::{Destination, Notifier, NotifyError};
use async_trait::async_trait;
use tracing::info;

/// Writes alerts to the log and always acknowledges
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str, destination: &Destination) -> Result<bool, NotifyError> {
        info!(destination = %destination, "ALERT: {}", message);
        Ok(true)
    }
}
