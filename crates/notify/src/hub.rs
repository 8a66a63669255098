//! Fan-out Delivery

use crate::{Destination, Notifier, NotifyError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends an alert to the admin and, when different, to the service owner.
///
/// A delivery is confirmed iff the admin acknowledged it. Owner deliveries
/// are best effort.
pub struct NotificationHub {
    notifier: Arc<dyn Notifier>,
    admin: Destination,
    timeout: Duration,
}

impl NotificationHub {
    pub fn new(notifier: Arc<dyn Notifier>, admin: Destination, timeout: Duration) -> Self {
        Self {
            notifier,
            admin,
            timeout,
        }
    }

    /// Deliver `message`; returns whether the admin delivery was confirmed
    pub async fn deliver(&self, message: &str, owner: Option<&Destination>) -> bool {
        let confirmed = match self.send_one(message, &self.admin).await {
            Ok(acked) => acked,
            Err(e) => {
                warn!(destination = %self.admin, error = %e, "Admin delivery failed");
                false
            }
        };

        if let Some(owner) = owner.filter(|owner| **owner != self.admin) {
            match self.send_one(message, owner).await {
                Ok(true) => debug!(destination = %owner, "Owner delivery acknowledged"),
                Ok(false) => warn!(destination = %owner, "Owner delivery not acknowledged"),
                Err(e) => warn!(destination = %owner, error = %e, "Owner delivery failed"),
            }
        }

        confirmed
    }

    async fn send_one(&self, message: &str, destination: &Destination) -> Result<bool, NotifyError> {
        match tokio::time::timeout(self.timeout, self.notifier.send(message, destination)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
