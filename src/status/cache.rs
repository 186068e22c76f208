//! TTL-bounded store of the last known status per entity.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::cooldown::deadline;
use crate::status::types::{Status, StatusEntry};

/// Point-in-time view of cache occupancy and effectiveness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub expired: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in percent; zero before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 * 100.0 / total as f64
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A thread-safe status cache.
///
/// Expired entries are reported as misses but stay in the map until
/// [`StatusCache::cleanup_expired`] runs, which keeps `get` free of writes.
#[derive(Debug)]
pub struct StatusCache {
    entries: DashMap<String, StatusEntry>,
    ttl_ms: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms: AtomicU64::new(millis(ttl)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }

    /// Applies to entries written after the change.
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(millis(ttl), Ordering::Relaxed);
    }

    /// Fresh entry for `name`, or `None` if absent or expired.
    pub fn get(&self, name: &str) -> Option<StatusEntry> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(name)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value().clone());

        match hit {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(true);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(false);
            }
        }
        hit
    }

    /// Entry for `name` regardless of expiry. Does not count as a lookup.
    pub fn peek(&self, name: &str) -> Option<StatusEntry> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    /// Record a successful observation and return the stored entry.
    pub fn put(&self, name: &str, status: Status, raw_payload: Option<String>) -> StatusEntry {
        let fetched_at = Instant::now();
        let entry = StatusEntry {
            name: name.to_string(),
            status,
            raw_payload,
            observed_at: Utc::now(),
            fetched_at,
            expires_at: deadline(fetched_at, self.ttl()),
        };
        self.entries.insert(name.to_string(), entry.clone());
        metrics::record_cache_size(self.entries.len());
        entry
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_cache_size(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Expired cache entries removed");
        }
        removed
    }

    pub fn remove(&self, name: &str) -> Option<StatusEntry> {
        self.entries.remove(name).map(|(_, entry)| entry)
    }

    /// Drop all entries and lookup counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        metrics::record_cache_size(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut fresh = 0;
        let mut expired = 0;
        for entry in self.entries.iter() {
            if entry.is_expired(now) {
                expired += 1;
            } else {
                fresh += 1;
            }
        }
        CacheStats {
            entries: fresh + expired,
            fresh,
            expired,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
