//! Outbound message delivery.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery to {destination} failed: {reason}")]
    Failed { destination: String, reason: String },

    #[error("delivery to {destination} timed out after {timeout:?}")]
    Timeout {
        destination: String,
        timeout: Duration,
    },

    #[error("invalid messenger configuration: {0}")]
    Config(String),
}

/// Sends text to a named destination (a subscriber group).
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        tracing::info!(destination = %destination, text = %text, "Notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    destination: &'a str,
    text: &'a str,
}

/// Posts `{"destination", "text"}` to a webhook; any non-2xx is a failure.
#[derive(Debug, Clone)]
pub struct WebhookMessenger {
    client: reqwest::Client,
    url: url::Url,
    timeout: Duration,
}

impl WebhookMessenger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let url = url::Url::parse(url).map_err(|e| DeliveryError::Config(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookPayload { destination, text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        destination: destination.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    DeliveryError::Failed {
                        destination: destination.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Failed {
                destination: destination.to_string(),
                reason: format!("webhook returned {}", status),
            })
        }
    }
}

/// Webhook messenger when a URL is configured, log messenger otherwise.
pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn Messenger>, DeliveryError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookMessenger::new(url, config.timeout())?)),
        None => Ok(Arc::new(LogMessenger)),
    }
}
