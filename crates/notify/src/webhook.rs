//! Webhook Notifier

use crate::{Destination, Notifier, NotifyError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Longest response body kept in a rejection error
const MAX_BODY_LENGTH: usize = 512;

/// Posts each alert as JSON to a fixed URL.
///
/// The receiving side routes by the `destination` field.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn payload(message: &str, destination: &Destination) -> Value {
        json!({
            "destination": destination.as_str(),
            "text": message,
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str, destination: &Destination) -> Result<bool, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(message, destination))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(destination = %destination, "Webhook delivered");
            return Ok(true);
        }

        let body = response
            .text()
            .await
            .map(|text| truncate(&text, MAX_BODY_LENGTH))
            .unwrap_or_default();
        warn!(destination = %destination, status = status.as_u16(), "Webhook rejected");
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
