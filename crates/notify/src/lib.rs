//! Alert Delivery
//!
//! A [`Notifier`] delivers one rendered message to one destination. The
//! [`NotificationHub`] fans an alert out to the admin and to whoever enabled
//! monitoring for the service, and decides whether the delivery counts as
//! confirmed.

mod error;
mod hub;
mod log;
mod webhook;

pub use error::NotifyError;
pub use hub::NotificationHub;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque address of an alert recipient (chat id, channel name, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Delivers a message to a single destination.
///
/// `Ok(false)` and `Err(_)` both mean "not delivered".
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, destination: &Destination) -> Result<bool, NotifyError>;
}
