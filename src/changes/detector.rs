//! Transition detection against the last known status.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::metrics;
use crate::status::{Status, TransitionEvent};

/// Last known status of an entity plus its change history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: Status,
    /// Transitions observed since the entity was first seen.
    pub changes: u32,
    pub last_change_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
}

/// Compares observations with the previous known value per entity.
///
/// Kept apart from the status cache so a transition is still detected
/// after the cached entry has expired and been evicted.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: DashMap<String, StatusRecord>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and return the transition it represents, if any.
    ///
    /// The first known observation only seeds the record. Unknown
    /// observations are ignored and do not replace the last known value.
    pub fn observe(
        &self,
        name: &str,
        new_status: Status,
        observed_at: DateTime<Utc>,
    ) -> Option<TransitionEvent> {
        if !new_status.is_known() {
            return None;
        }

        match self.previous.entry(name.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(StatusRecord {
                    status: new_status,
                    changes: 0,
                    last_change_at: None,
                    first_seen_at: observed_at,
                });
                tracing::debug!(name = %name, status = %new_status, "Seeded initial status");
                None
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.status == new_status {
                    return None;
                }

                let previous_status = record.status;
                record.status = new_status;
                record.changes = record.changes.saturating_add(1);
                record.last_change_at = Some(observed_at);
                metrics::record_transition(new_status.as_str());
                tracing::info!(
                    name = %name,
                    from = %previous_status,
                    to = %new_status,
                    "Status transition"
                );

                Some(TransitionEvent {
                    name: name.to_string(),
                    previous_status,
                    new_status,
                    observed_at,
                })
            }
        }
    }

    pub fn previous(&self, name: &str) -> Option<Status> {
        self.previous.get(name).map(|record| record.status)
    }

    pub fn record(&self, name: &str) -> Option<StatusRecord> {
        self.previous.get(name).map(|record| record.value().clone())
    }

    /// Forget an entity so its next observation seeds again.
    pub fn forget(&self, name: &str) -> bool {
        self.previous.remove(name).is_some()
    }

    /// Count of (online, offline) entities by last known status.
    pub fn counts(&self) -> (usize, usize) {
        self.previous
            .iter()
            .fold((0, 0), |(online, offline), record| match record.status {
                Status::Online => (online + 1, offline),
                Status::Offline => (online, offline + 1),
                Status::Unknown => (online, offline),
            })
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}
