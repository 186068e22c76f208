//! Request coalescing and batched provider calls.

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use crate::batch::pending::{PendingQuery, StatusFuture};
use crate::changes::ChangeDetector;
use crate::config::BatchConfig;
use crate::health::HealthTracker;
use crate::observability::metrics;
use crate::provider::{Observation, StatusProvider};
use crate::status::{normalize_name, QueryError, StatusCache, TransitionEvent};

/// Receives transitions detected after a batch is applied.
pub trait TransitionSink: Send + Sync {
    fn on_transition(&self, event: TransitionEvent);
}

/// Size and time thresholds of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub max_wait: Duration,
}

impl From<&BatchConfig> for BatchSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_wait: config.max_wait(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

/// Counters of provider traffic since start or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchStats {
    pub batches: u64,
    pub names_queried: u64,
    pub average_batch_ms: f64,
    pub in_flight: usize,
    pub pending: usize,
}

/// Decrements the in-flight count even if the provider call unwinds.
struct InFlight<'a> {
    count: &'a AtomicUsize,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize, idle: &'a Notify) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self { count, idle }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Turns many concurrent status requests into few provider calls.
///
/// Each name has at most one pending query; callers asking for a name that
/// is already queued are attached to it. The pending set is flushed when it
/// reaches `batch_size`, or by the flush tick once its oldest query has
/// waited `max_wait`.
///
/// For each name, cache and health are updated before waiters complete,
/// and waiters complete before change detection and notification.
pub struct BatchQueryCoordinator {
    provider: Arc<dyn StatusProvider>,
    cache: Arc<StatusCache>,
    health: Arc<HealthTracker>,
    detector: Arc<ChangeDetector>,
    sink: Arc<dyn TransitionSink>,
    settings: ArcSwap<BatchSettings>,
    pending: DashMap<String, PendingQuery>,
    draining: AtomicBool,
    batches: AtomicU64,
    names_queried: AtomicU64,
    batch_millis: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl BatchQueryCoordinator {
    pub fn new(
        settings: BatchSettings,
        provider: Arc<dyn StatusProvider>,
        cache: Arc<StatusCache>,
        health: Arc<HealthTracker>,
        detector: Arc<ChangeDetector>,
        sink: Arc<dyn TransitionSink>,
    ) -> Self {
        Self {
            provider,
            cache,
            health,
            detector,
            sink,
            settings: ArcSwap::from_pointee(settings),
            pending: DashMap::new(),
            draining: AtomicBool::new(false),
            batches: AtomicU64::new(0),
            names_queried: AtomicU64::new(0),
            batch_millis: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    pub fn settings(&self) -> BatchSettings {
        **self.settings.load()
    }

    /// Takes effect on the next request or tick.
    pub fn set_settings(&self, settings: BatchSettings) {
        self.settings.store(Arc::new(settings));
    }

    /// Ask for the status of `name`.
    ///
    /// Never blocks: a fresh cache entry is returned as a ready future,
    /// otherwise the caller joins the pending query for the name.
    pub fn request_status(self: &Arc<Self>, name: &str) -> StatusFuture {
        let name = match normalize_name(name) {
            Ok(name) => name,
            Err(e) => return StatusFuture::ready(Err(e)),
        };

        if let Some(entry) = self.cache.get(&name) {
            return StatusFuture::ready(Ok(entry));
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.entry(name) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().attach(tx);
                tracing::trace!(name = %occupied.key(), "Coalesced status request");
            }
            Entry::Vacant(vacant) => {
                let name = vacant.key().clone();
                vacant.insert(PendingQuery::new(name, tx));
            }
        }

        let pending = self.pending.len();
        metrics::record_pending(pending);
        if pending >= self.settings().batch_size {
            self.spawn_flush();
        }

        StatusFuture::waiting(rx)
    }

    fn spawn_flush(self: &Arc<Self>) {
        match Handle::try_current() {
            Ok(handle) => {
                let coordinator = Arc::clone(self);
                handle.spawn(async move {
                    coordinator.flush().await;
                });
            }
            Err(_) => {
                tracing::warn!("No runtime to flush a full batch; leaving it to the flush tick");
            }
        }
    }

    /// Drain everything pending into one provider call. Returns the batch
    /// size, or zero when nothing was drained.
    pub async fn flush(self: &Arc<Self>) -> usize {
        match self.drain() {
            Some(batch) => {
                let size = batch.len();
                self.execute(batch).await;
                size
            }
            None => 0,
        }
    }

    /// Flush only if the pending set is full or its oldest query has
    /// waited at least `max_wait`. Used by the flush tick.
    pub async fn flush_due(self: &Arc<Self>) -> usize {
        if self.is_due(Instant::now()) {
            self.flush().await
        } else {
            0
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        let settings = self.settings();
        if self.pending.len() >= settings.batch_size {
            return true;
        }
        self.pending
            .iter()
            .any(|query| now.saturating_duration_since(query.enqueued_at) >= settings.max_wait)
    }

    /// Move the pending set out of the map. Only one drain runs at a time;
    /// a concurrent drain returns `None` and leaves the work to the owner.
    fn drain(self: &Arc<Self>) -> Option<Vec<PendingQuery>> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("Drain already in progress");
            return None;
        }

        let names: Vec<String> = self.pending.iter().map(|query| query.key().clone()).collect();
        let batch: Vec<PendingQuery> = names
            .iter()
            .filter_map(|name| self.pending.remove(name).map(|(_, query)| query))
            .collect();

        self.draining.store(false, Ordering::Release);

        let remaining = self.pending.len();
        metrics::record_pending(remaining);
        if remaining >= self.settings().batch_size {
            self.spawn_flush();
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    async fn execute(&self, batch: Vec<PendingQuery>) {
        let _in_flight = InFlight::enter(&self.in_flight, &self.idle);
        let names: Vec<String> = batch.iter().map(|query| query.name.clone()).collect();

        tracing::debug!(size = names.len(), "Executing status batch");
        let started = Instant::now();
        let outcome = self.provider.query_batch(&names).await;
        let elapsed = started.elapsed();

        self.batches.fetch_add(1, Ordering::Relaxed);
        self.names_queried
            .fetch_add(names.len() as u64, Ordering::Relaxed);
        self.batch_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        metrics::record_batch(names.len(), elapsed);

        match outcome {
            Ok(records) => {
                let mut results: HashMap<String, Result<Observation, String>> = records
                    .into_iter()
                    .map(|record| (record.name, record.outcome))
                    .collect();

                for query in batch {
                    match results.remove(&query.name) {
                        Some(Ok(observation)) => self.resolve_success(query, observation),
                        Some(Err(reason)) => {
                            let error = QueryError::Rejected {
                                name: query.name.clone(),
                                reason,
                            };
                            self.resolve_failure(query, error, "rejected");
                        }
                        None => {
                            let error = QueryError::Missing(query.name.clone());
                            self.resolve_failure(query, error, "missing");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(size = names.len(), error = %e, "Status batch failed");
                let error = QueryError::Provider(e.to_string());
                for query in batch {
                    self.resolve_failure(query, error.clone(), "provider_error");
                }
            }
        }
    }

    fn resolve_success(&self, query: PendingQuery, observation: Observation) {
        let entry = self
            .cache
            .put(&query.name, observation.status, observation.raw_payload);
        self.health.record_success(&query.name);
        metrics::record_query_outcome("success");

        query.complete(Ok(entry.clone()));

        if let Some(event) = self
            .detector
            .observe(&entry.name, entry.status, entry.observed_at)
        {
            self.sink.on_transition(event);
        }
    }

    fn resolve_failure(&self, query: PendingQuery, error: QueryError, outcome: &'static str) {
        self.health.record_failure(&query.name);
        metrics::record_query_outcome(outcome);
        tracing::debug!(name = %query.name, error = %error, "Status query failed");

        query.complete(Err(error));
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> BatchStats {
        let batches = self.batches.load(Ordering::Relaxed);
        let millis = self.batch_millis.load(Ordering::Relaxed);
        BatchStats {
            batches,
            names_queried: self.names_queried.load(Ordering::Relaxed),
            average_batch_ms: if batches == 0 {
                0.0
            } else {
                millis as f64 / batches as f64
            },
            in_flight: self.in_flight(),
            pending: self.pending_len(),
        }
    }

    pub fn reset_stats(&self) {
        self.batches.store(0, Ordering::Relaxed);
        self.names_queried.store(0, Ordering::Relaxed);
        self.batch_millis.store(0, Ordering::Relaxed);
    }

    /// Wait until no batch is in flight. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl std::fmt::Debug for BatchQueryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchQueryCoordinator")
            .field("settings", &self.settings())
            .field("pending", &self.pending_len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
