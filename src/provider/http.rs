//! HTTP JSON status provider.
//!
//! # Wire Format
//! ```text
//! POST {endpoint}
//!     {"names": ["alice", "bob"]}
//!
//! 200 OK
//!     {"results": [
//!         {"name": "alice", "status": "online"},
//!         {"name": "bob", "status": null, "error": "no such member"}
//!     ]}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::ProviderConfig;
use crate::provider::{ProviderError, ProviderRecord, StatusProvider};
use crate::resilience::backoff::calculate_backoff;
use crate::status::Status;

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    names: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResultRecord {
    name: String,
    #[serde(default)]
    status: Option<Status>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider backed by a batch lookup endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatusProvider {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl HttpStatusProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ProviderError::Transport(format!("invalid endpoint: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("presence-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        })
    }

    async fn attempt(&self, names: &[String]) -> Result<Vec<ProviderRecord>, ProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&BatchRequest { names })
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body: BatchResponse = response.json().await.map_err(|e| self.classify(e))?;
        Ok(decode_records(body.results))
    }

    fn classify(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else if error.is_decode() {
            ProviderError::Decode(error.to_string())
        } else {
            ProviderError::Transport(error.to_string())
        }
    }
}

/// Turn raw result objects into records; unparseable objects are skipped
/// and therefore reported as missing by the coordinator.
fn decode_records(results: Vec<serde_json::Value>) -> Vec<ProviderRecord> {
    results
        .into_iter()
        .filter_map(|value| {
            let raw = value.to_string();
            match serde_json::from_value::<ResultRecord>(value) {
                Ok(record) => Some(match (record.status, record.error) {
                    (_, Some(error)) => ProviderRecord::failure(record.name, error),
                    (Some(status), None) => ProviderRecord::success(record.name, status, Some(raw)),
                    (None, None) => ProviderRecord::failure(record.name, "no status in response"),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, record = %raw, "Skipping malformed provider record");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    async fn query_batch(&self, names: &[String]) -> Result<Vec<ProviderRecord>, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(names).await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_records() {
        let records = decode_records(vec![
            json!({"name": "alice", "status": "online", "since": "09:00"}),
            json!({"name": "bob", "status": "offline"}),
            json!({"name": "carol", "status": null, "error": "no such member"}),
            json!({"name": "dave"}),
            json!({"status": "online"}),
        ]);

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].name, "alice");
        let alice = records[0].outcome.as_ref().unwrap();
        assert_eq!(alice.status, Status::Online);
        assert!(alice.raw_payload.as_deref().unwrap().contains("09:00"));
        assert_eq!(records[1].outcome.as_ref().unwrap().status, Status::Offline);
        assert_eq!(records[2].outcome, Err("no such member".to_string()));
        assert!(records[3].outcome.is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let config = ProviderConfig {
            endpoint: "::nope".to_string(),
            ..ProviderConfig::default()
        };
        assert!(HttpStatusProvider::new(&config).is_err());
    }
}
