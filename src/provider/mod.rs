//! External status provider.
//!
//! # Responsibilities
//! - Define the batch lookup contract consumed by the coordinator
//! - Report per-name outcomes so one bad name does not fail the batch
//!
//! # Design Decisions
//! - A call either fails as a whole (`ProviderError`) or returns records
//! - Names absent from the records are treated as failures by the caller
//! - Retries live inside the implementation, not in the coordinator

pub mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::status::Status;

pub use http::HttpStatusProvider;

/// A successful lookup for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub status: Status,
    pub raw_payload: Option<String>,
}

/// Provider answer for one requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub name: String,
    /// `Err` carries the provider's reason for this name.
    pub outcome: Result<Observation, String>,
}

impl ProviderRecord {
    pub fn success(name: impl Into<String>, status: Status, raw_payload: Option<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Ok(Observation {
                status,
                raw_payload,
            }),
        }
    }

    pub fn failure(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Err(reason.into()),
        }
    }
}

/// Whole-call failure of a batch lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout(_) => true,
            ProviderError::Status(code) => *code >= 500,
            ProviderError::Decode(_) => false,
        }
    }
}

/// Looks up the status of many names in one call.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn query_batch(&self, names: &[String]) -> Result<Vec<ProviderRecord>, ProviderError>;
}
