//! Core status types shared by every stage of the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Observed presence of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
    Unknown,
}

impl Status {
    /// Only online/offline observations take part in transition detection.
    pub fn is_known(self) -> bool {
        !matches!(self, Status::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Offline => "offline",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last successful observation of an entity.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    /// Normalized entity name.
    pub name: String,
    pub status: Status,
    /// Provider response for diagnostics.
    pub raw_payload: Option<String>,
    /// Wall-clock time of the query that produced this entry.
    pub observed_at: DateTime<Utc>,
    /// Monotonic counterpart of `observed_at`.
    #[serde(skip)]
    pub fetched_at: Instant,
    #[serde(skip)]
    pub expires_at: Instant,
}

impl StatusEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Why a status request did not produce an entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("entity name must not be empty")]
    EmptyName,

    #[error("status provider failed: {0}")]
    Provider(String),

    #[error("provider returned no result for {0}")]
    Missing(String),

    #[error("provider rejected {name}: {reason}")]
    Rejected { name: String, reason: String },

    #[error("status request was dropped before completion")]
    Closed,
}

/// Outcome delivered to every caller waiting on a name.
pub type StatusResult = Result<StatusEntry, QueryError>;

/// A change between two successive known observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub name: String,
    pub previous_status: Status,
    pub new_status: Status,
    pub observed_at: DateTime<Utc>,
}

/// Trim a caller-supplied name; case is preserved.
pub fn normalize_name(raw: &str) -> Result<String, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueryError::EmptyName);
    }
    Ok(trimmed.to_string())
}
