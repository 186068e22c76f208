//! The assembled status pipeline and its caller-facing operations.
//!
//! # Data Flow
//! ```text
//! caller / roster tick
//!     → BatchQueryCoordinator (cache, coalescing, batching)
//!     → StatusProvider
//!     → StatusCache + HealthTracker → waiters
//!     → ChangeDetector → NotificationDispatcher → Messenger
//! ```
//!
//! # Design Decisions
//! - Every component is built here and shared by handle; no globals
//! - Ticks hold a weak handle so a dropped monitor stops doing work
//! - Reconfiguration swaps settings in place and re-registers the ticks

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use std::fmt::{self, Write as _};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::batch::{BatchQueryCoordinator, BatchSettings, BatchStats, StatusFuture};
use crate::changes::ChangeDetector;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::health::{CycleReport, HealthPolicy, HealthSummary, HealthTracker, SystemHealthMonitor};
use crate::notify::{format, DispatchSummary, Messenger, NotificationDispatcher};
use crate::provider::StatusProvider;
use crate::scheduler::{Scheduler, TaskId};
use crate::status::{normalize_name, CacheStats, QueryError, Status, StatusCache};
use crate::subscriptions::{SubscriptionChange, SubscriptionRegistry};

#[derive(Debug, Clone, Copy)]
struct Ticks {
    flush: TaskId,
    cleanup: TaskId,
    roster: TaskId,
}

/// Snapshot of every counter the monitor keeps.
#[derive(Debug, Clone, Copy)]
pub struct MonitorStats {
    pub enabled: bool,
    pub batch: BatchStats,
    pub cache: CacheStats,
    pub health: HealthSummary,
    pub groups: usize,
    pub names: usize,
    pub online: usize,
    pub offline: usize,
    pub notifications: DispatchSummary,
    pub scheduled_tasks: usize,
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Presence monitor statistics")?;
        writeln!(
            f,
            "Roster check: {}",
            if self.enabled { "enabled" } else { "disabled" }
        )?;
        writeln!(
            f,
            "Batches: {} executed, {} names queried, {:.1} ms average, {} in flight, {} pending",
            self.batch.batches,
            self.batch.names_queried,
            self.batch.average_batch_ms,
            self.batch.in_flight,
            self.batch.pending
        )?;
        writeln!(
            f,
            "Cache: {} entries ({} fresh, {} expired), {:.1}% hit rate",
            self.cache.entries,
            self.cache.fresh,
            self.cache.expired,
            self.cache.hit_rate()
        )?;
        writeln!(
            f,
            "Health: {} tracked, {} failing, {} in cooldown, {} checks, {} failures",
            self.health.tracked,
            self.health.failing,
            self.health.in_cooldown,
            self.health.total_checks,
            self.health.total_failures
        )?;
        writeln!(
            f,
            "Subscriptions: {} groups, {} names ({} online, {} offline)",
            self.groups, self.names, self.online, self.offline
        )?;
        writeln!(
            f,
            "Notifications: {} delivered, {} failed",
            self.notifications.delivered, self.notifications.failed
        )?;
        write!(f, "Scheduler: {} active tasks", self.scheduled_tasks)
    }
}

/// Status monitoring for many entities on behalf of many groups.
pub struct PresenceMonitor {
    config: ArcSwap<MonitorConfig>,
    cache: Arc<StatusCache>,
    health: Arc<HealthTracker>,
    detector: Arc<ChangeDetector>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    coordinator: Arc<BatchQueryCoordinator>,
    system_health: SystemHealthMonitor,
    scheduler: Scheduler,
    ticks: Mutex<Option<Ticks>>,
    enabled: AtomicBool,
}

impl PresenceMonitor {
    pub fn new(
        config: MonitorConfig,
        provider: Arc<dyn StatusProvider>,
        messenger: Arc<dyn Messenger>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Arc<Self> {
        let cache = Arc::new(StatusCache::new(config.cache.ttl()));
        let health = Arc::new(HealthTracker::new(HealthPolicy::from(&config.health)));
        let detector = Arc::new(ChangeDetector::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&registry), messenger));
        let coordinator = Arc::new(BatchQueryCoordinator::new(
            BatchSettings::from(&config.batch),
            provider,
            Arc::clone(&cache),
            Arc::clone(&health),
            Arc::clone(&detector),
            dispatcher.clone(),
        ));

        let enabled = config.health.monitoring_enabled;
        Arc::new(Self {
            system_health: SystemHealthMonitor::new(&config.health),
            config: ArcSwap::from_pointee(config),
            cache,
            health,
            detector,
            registry,
            dispatcher,
            coordinator,
            scheduler: Scheduler::new(),
            ticks: Mutex::new(None),
            enabled: AtomicBool::new(enabled),
        })
    }

    pub fn config(&self) -> Arc<MonitorConfig> {
        self.config.load_full()
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<BatchQueryCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn request_status(&self, name: &str) -> StatusFuture {
        self.coordinator.request_status(name)
    }

    /// Subscribe `group_id` to `name`. A newly watched name is queried
    /// right away so its first observation is seeded.
    pub fn add_subscription(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<SubscriptionChange, MonitorError> {
        let change = self.registry.add_subscription(group_id, name)?;
        if change == SubscriptionChange::Added {
            let _ = self.coordinator.request_status(name);
        }
        Ok(change)
    }

    pub fn remove_subscription(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<SubscriptionChange, MonitorError> {
        Ok(self.registry.remove_subscription(group_id, name)?)
    }

    /// Submit every subscribed name once. Returns how many were submitted.
    pub fn prime(&self) -> usize {
        let names = self.registry.all_names();
        for name in &names {
            let _ = self.coordinator.request_status(name);
        }
        tracing::info!(names = names.len(), "Primed subscribed entities");
        names.len()
    }

    /// Flush whatever is pending, regardless of age or size.
    pub async fn flush_pending(&self) -> usize {
        self.coordinator.flush().await
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Switch the roster check on or off. Returns the previous setting.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::info!(enabled, "Roster check switched");
        }
        previous
    }

    /// Check every subscribed entity that is not cooling down, then raise
    /// a system warning if the cycle failed too often. Only names that
    /// reached the provider count towards the failure rate.
    pub async fn run_roster_check(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut checks = Vec::new();

        for name in self.registry.all_names() {
            if !self.health.is_eligible(&name) {
                report.skipped += 1;
                tracing::debug!(name = %name, "Skipping entity in cooldown");
                continue;
            }
            let check = self.coordinator.request_status(&name);
            if check.is_ready() {
                report.cached += 1;
            } else {
                checks.push(check);
            }
        }
        report.checked = checks.len();

        for result in join_all(checks).await {
            match result {
                Ok(_) => report.succeeded += 1,
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            checked = report.checked,
            cached = report.cached,
            skipped = report.skipped,
            succeeded = report.succeeded,
            failed = report.failed,
            "Roster check complete"
        );

        if let Some(alert) = self.system_health.evaluate(&report) {
            tracing::warn!(
                failure_rate = alert.failure_rate,
                failed = alert.failed,
                checked = alert.checked,
                "Status checks degraded"
            );
            self.dispatcher.broadcast(format::degradation(&alert));
        }
        report
    }

    fn cleanup(&self) {
        let expired = self.cache.cleanup_expired();
        let idle = self.health.cleanup_idle();
        tracing::debug!(expired, idle, "Cleanup tick");
    }

    pub fn stats(&self) -> MonitorStats {
        let names = self.registry.all_names();
        let (online, offline) = names.iter().fold((0, 0), |(on, off), name| {
            match self.detector.previous(name) {
                Some(Status::Online) => (on + 1, off),
                Some(Status::Offline) => (on, off + 1),
                _ => (on, off),
            }
        });

        MonitorStats {
            enabled: self.is_enabled(),
            batch: self.coordinator.stats(),
            cache: self.cache.stats(),
            health: self.health.summary(),
            groups: self.registry.group_count(),
            names: names.len(),
            online,
            offline,
            notifications: self.dispatcher.stats(),
            scheduled_tasks: self.scheduler.len(),
        }
    }

    pub fn statistics(&self) -> String {
        self.stats().to_string()
    }

    /// Clear counters, the status cache and health history.
    pub fn reset_statistics(&self) {
        self.coordinator.reset_stats();
        self.cache.clear();
        self.health.reset_all();
        self.dispatcher.reset_stats();
        tracing::info!("Statistics reset");
    }

    pub fn subscription_summary(&self, group_id: &str) -> String {
        let group = group_id.trim();
        let names = self.registry.names_for(group);
        if names.is_empty() {
            return format!("No subscriptions for {}", group);
        }

        let now = Instant::now();
        let mut text = format!("Subscriptions for {} ({})", group, names.len());
        for name in &names {
            let _ = write!(text, "\n- {}: ", name);
            match (self.detector.record(name), self.cache.peek(name)) {
                (Some(record), _) => {
                    let _ = write!(text, "{}", record.status);
                    if let Some(at) = record.last_change_at {
                        let _ = write!(
                            text,
                            ", {} changes, last {}",
                            record.changes,
                            format::timestamp(at)
                        );
                    }
                }
                (None, Some(entry)) => {
                    let _ = write!(text, "{}", entry.status);
                }
                (None, None) => text.push_str("not checked yet"),
            }
            if let Some(left) = self
                .health
                .get_stats(name)
                .and_then(|stats| stats.cooldown_remaining(now))
            {
                let _ = write!(text, " (cooling down, {} left)", format::duration(left));
            }
        }
        text
    }

    /// Re-query every name `group_id` watches, bypassing the cache, and
    /// describe what changed and where the cache disagreed with the
    /// provider.
    pub async fn sync_group(&self, group_id: &str) -> String {
        let group = group_id.trim();
        let names = self.registry.names_for(group);
        if names.is_empty() {
            return format!("No subscriptions for {}", group);
        }

        let mut checks = Vec::with_capacity(names.len());
        for name in &names {
            let cached = self.cache.remove(name).map(|entry| entry.status);
            let previous = self.detector.previous(name);
            checks.push((cached, previous, self.coordinator.request_status(name)));
        }
        // Another drain may have taken our names; then there is nothing to do
        // but wait for it.
        while names.iter().any(|name| self.coordinator.is_pending(name)) {
            if self.coordinator.flush().await == 0 {
                tokio::task::yield_now().await;
            }
        }

        let (meta, futures): (Vec<_>, Vec<_>) = checks
            .into_iter()
            .map(|(cached, previous, check)| ((cached, previous), check))
            .unzip();
        let results = join_all(futures).await;

        let mut text = format!("Sync of {} ({})", group, names.len());
        let (mut synced, mut changed) = (0, 0);
        for ((name, (cached, previous)), result) in names.iter().zip(meta).zip(results) {
            let _ = write!(text, "\n- {}: ", name);
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    let _ = write!(text, "check failed ({})", e);
                    continue;
                }
            };
            synced += 1;
            let live = entry.status;
            match previous {
                Some(before) if live.is_known() && before != live => {
                    changed += 1;
                    let _ = write!(text, "{} -> {}", before, live);
                }
                Some(before) if !live.is_known() => {
                    let _ = write!(text, "{} (last known {})", live, before);
                }
                Some(_) => {
                    let _ = write!(text, "{} (no change)", live);
                }
                None => {
                    let _ = write!(text, "{} (first check)", live);
                }
            }
            if let Some(cached) = cached.filter(|&cached| cached != live) {
                let _ = write!(text, ", cached {}", cached);
            }
        }
        let _ = write!(text, "\nSynced {} of {}, {} changed", synced, names.len(), changed);
        tracing::info!(group = %group, names = names.len(), synced, changed, "Group synced");
        text
    }

    /// Forget the cached status, health history and last observation of
    /// one entity. Returns `false` if nothing was known about it.
    pub fn reset_member(&self, name: &str) -> Result<bool, QueryError> {
        let name = normalize_name(name)?;
        let cached = self.cache.remove(&name).is_some();
        let tracked = self.health.reset(&name);
        let observed = self.detector.forget(&name);
        let cleared = cached || tracked || observed;
        tracing::info!(name = %name, cleared, "Entity reset");
        Ok(cleared)
    }

    pub fn member_health(&self, name: &str) -> Result<String, QueryError> {
        let name = normalize_name(name)?;
        let now = Instant::now();
        let stats = self.health.get_stats(&name);
        let record = self.detector.record(&name);
        let entry = self.cache.peek(&name);

        if stats.is_none() && record.is_none() && entry.is_none() {
            return Ok(format!("No health data for {} yet", name));
        }

        let mut text = format!("Health of {}", name);
        match &entry {
            Some(entry) if !entry.is_expired(now) => {
                let _ = write!(
                    text,
                    "\nCached: {} (fresh for {})",
                    entry.status,
                    format::duration(entry.expires_at.saturating_duration_since(now))
                );
            }
            Some(entry) => {
                let _ = write!(text, "\nCached: {} (expired)", entry.status);
            }
            None => text.push_str("\nCached: none"),
        }
        if let Some(record) = &record {
            let _ = write!(
                text,
                "\nLast known: {} since {}, {} changes",
                record.status,
                format::timestamp(record.last_change_at.unwrap_or(record.first_seen_at)),
                record.changes
            );
        }
        if let Some(stats) = &stats {
            let _ = write!(
                text,
                "\nChecks: {} total, {} failed ({:.1}%)\nConsecutive failures: {}",
                stats.total_checks,
                stats.total_failures,
                stats.failure_rate() * 100.0,
                stats.consecutive_failures
            );
            match stats.cooldown_remaining(now) {
                Some(left) => {
                    let _ = write!(text, "\nCooldown: {} left", format::duration(left));
                }
                None => text.push_str("\nCooldown: none"),
            }
        }
        let groups = self.registry.groups_watching(&name);
        if !groups.is_empty() {
            let groups: Vec<&str> = groups.iter().map(String::as_str).collect();
            let _ = write!(text, "\nWatched by: {}", groups.join(", "));
        }
        Ok(text)
    }

    fn schedule<F, Fut>(self: &Arc<Self>, name: &str, period: Duration, job: F) -> TaskId
    where
        F: Fn(Arc<Self>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let monitor = Arc::downgrade(self);
        self.scheduler.schedule_periodic(name, period, move || {
            let run = monitor.upgrade().map(&job);
            async move {
                if let Some(run) = run {
                    run.await;
                }
            }
        })
    }

    /// Register the flush, cleanup and roster ticks. Returns `false` if
    /// they are already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut ticks = self.ticks.lock().unwrap_or_else(|e| e.into_inner());
        if ticks.is_some() {
            return false;
        }

        let config = self.config();
        let flush = self.schedule("batch-flush", config.batch.flush_tick(), |m| async move {
            m.coordinator.flush_due().await;
        });
        let cleanup = self.schedule("cache-cleanup", config.cache.cleanup_interval(), |m| async move {
            m.cleanup();
        });
        let roster = self.schedule("roster-check", config.health.check_interval(), |m| async move {
            if !m.is_enabled() {
                tracing::debug!("Roster check disabled, skipping tick");
                return;
            }
            m.run_roster_check().await;
        });

        *ticks = Some(Ticks {
            flush,
            cleanup,
            roster,
        });
        tracing::info!(
            flush_tick_ms = config.batch.flush_tick_ms,
            cleanup_interval_secs = config.cache.cleanup_interval_secs,
            check_interval_secs = config.health.check_interval_secs,
            "Monitor ticks started"
        );
        true
    }

    /// Cancel the ticks, letting running jobs finish. The flush tick stops
    /// last so a running roster check can still complete.
    pub async fn stop_ticks(&self) -> bool {
        let ticks = self.ticks.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(ticks) = ticks else {
            return false;
        };
        self.scheduler.cancel_and_wait(ticks.roster).await;
        self.scheduler.cancel_and_wait(ticks.cleanup).await;
        self.scheduler.cancel_and_wait(ticks.flush).await;
        true
    }

    /// Apply a reloaded configuration to the running monitor.
    pub async fn apply_config(self: &Arc<Self>, new: MonitorConfig) {
        let old = self.config();
        if *old == new {
            tracing::debug!("Configuration unchanged");
            return;
        }

        self.coordinator.set_settings(BatchSettings::from(&new.batch));
        self.cache.set_ttl(new.cache.ttl());
        self.health.set_policy(HealthPolicy::from(&new.health));
        self.system_health.reconfigure(&new.health);

        if old.provider != new.provider
            || old.notification != new.notification
            || old.persistence != new.persistence
            || old.admin != new.admin
            || old.observability != new.observability
        {
            tracing::warn!("Provider, notification, persistence, admin and observability changes apply after restart");
        }

        if old.health.monitoring_enabled != new.health.monitoring_enabled {
            self.set_enabled(new.health.monitoring_enabled);
        }

        let retime = old.batch.flush_tick_ms != new.batch.flush_tick_ms
            || old.cache.cleanup_interval_secs != new.cache.cleanup_interval_secs
            || old.health.check_interval_secs != new.health.check_interval_secs;
        self.config.store(Arc::new(new));

        if retime && self.stop_ticks().await {
            self.start();
        }
        tracing::info!(retimed = retime, "Configuration applied");
    }

    /// Stop ticks, answer queued callers with one last batch and wait up
    /// to `timeout` for batches in flight. Returns `false` on timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.stop_ticks().await;
        let flushed = self.coordinator.flush().await;
        let idle = self.coordinator.wait_idle(timeout).await;
        tracing::info!(flushed, idle, "Monitor stopped");
        idle
    }
}

impl fmt::Debug for PresenceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceMonitor")
            .field("coordinator", &self.coordinator)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogMessenger;
    use crate::provider::{ProviderError, ProviderRecord};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct EverybodyOnline;

    /// Answers with whatever status is currently set and counts calls.
    #[derive(Default)]
    struct Switchable {
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusProvider for Switchable {
        async fn query_batch(
            &self,
            names: &[String],
        ) -> Result<Vec<ProviderRecord>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = if self.offline.load(Ordering::SeqCst) {
                Status::Offline
            } else {
                Status::Online
            };
            Ok(names
                .iter()
                .map(|name| ProviderRecord::success(name.clone(), status, None))
                .collect())
        }
    }

    fn switchable_monitor() -> (Arc<PresenceMonitor>, Arc<Switchable>) {
        let provider = Arc::new(Switchable::default());
        let monitor = PresenceMonitor::new(
            MonitorConfig::default(),
            provider.clone(),
            Arc::new(LogMessenger),
            Arc::new(SubscriptionRegistry::new()),
        );
        (monitor, provider)
    }

    #[async_trait]
    impl StatusProvider for EverybodyOnline {
        async fn query_batch(
            &self,
            names: &[String],
        ) -> Result<Vec<ProviderRecord>, ProviderError> {
            Ok(names
                .iter()
                .map(|name| ProviderRecord::success(name.clone(), Status::Online, None))
                .collect())
        }
    }

    fn monitor() -> Arc<PresenceMonitor> {
        PresenceMonitor::new(
            MonitorConfig::default(),
            Arc::new(EverybodyOnline),
            Arc::new(LogMessenger),
            Arc::new(SubscriptionRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_add_subscription_warms_entity() {
        let monitor = monitor();
        assert_eq!(
            monitor.add_subscription("ops", "alice").unwrap(),
            SubscriptionChange::Added
        );
        assert!(monitor.coordinator().is_pending("alice"));

        assert_eq!(
            monitor.add_subscription("ops", "alice").unwrap(),
            SubscriptionChange::AlreadyPresent
        );
        assert_eq!(monitor.coordinator().pending_len(), 1);

        monitor.flush_pending().await;
        assert_eq!(monitor.detector().previous("alice"), Some(Status::Online));
    }

    #[tokio::test]
    async fn test_summary_and_statistics_text() {
        let monitor = monitor();
        assert_eq!(monitor.subscription_summary("ops"), "No subscriptions for ops");

        monitor.add_subscription("ops", "alice").unwrap();
        monitor.add_subscription("ops", "bob").unwrap();
        assert!(monitor.subscription_summary("ops").contains("alice: not checked yet"));

        monitor.flush_pending().await;
        let summary = monitor.subscription_summary("ops");
        assert!(summary.starts_with("Subscriptions for ops (2)"));
        assert!(summary.contains("- bob: online"));

        let stats = monitor.stats();
        assert_eq!(stats.batch.batches, 1);
        assert_eq!(stats.online, 2);
        assert!(monitor.statistics().contains("2 names (2 online, 0 offline)"));

        monitor.reset_statistics();
        let stats = monitor.stats();
        assert_eq!(stats.batch.batches, 0);
        assert_eq!(stats.cache.entries, 0);
        assert_eq!(stats.health.tracked, 0);
    }

    #[tokio::test]
    async fn test_member_health() {
        let monitor = monitor();
        assert_eq!(monitor.member_health(" "), Err(QueryError::EmptyName));
        assert_eq!(monitor.member_health("carol").unwrap(), "No health data for carol yet");

        let _ = monitor.request_status("carol");
        monitor.flush_pending().await;
        let text = monitor.member_health("carol").unwrap();
        assert!(text.contains("Cached: online"));
        assert!(text.contains("Checks: 1 total, 0 failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_start_once_and_stop() {
        let monitor = monitor();
        assert!(monitor.start());
        assert!(!monitor.start());
        assert_eq!(monitor.scheduler().len(), 3);

        let pending = monitor.request_status("dave");
        assert_eq!(pending.await.unwrap().status, Status::Online);

        assert!(monitor.shutdown(Duration::from_secs(1)).await);
        assert!(monitor.scheduler().is_empty());
        assert!(!monitor.stop_ticks().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_config_retimes_ticks() {
        let monitor = monitor();
        monitor.start();
        let before: Vec<_> = monitor.scheduler().active().into_iter().map(|t| t.id).collect();

        let mut config = MonitorConfig::default();
        config.batch.batch_size = 2;
        config.health.check_interval_secs = 5;
        monitor.apply_config(config).await;

        assert_eq!(monitor.coordinator().settings().batch_size, 2);
        let after = monitor.scheduler().active();
        assert_eq!(after.len(), 3);
        assert!(after.iter().all(|t| !before.contains(&t.id)));
        let roster = after.iter().find(|t| t.name == "roster-check").unwrap();
        assert_eq!(roster.period, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_roster_tick_queries_nothing() {
        let (monitor, provider) = switchable_monitor();
        monitor.add_subscription("ops", "alice").unwrap();
        monitor.flush_pending().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        assert!(monitor.is_enabled());
        assert!(monitor.set_enabled(false));
        assert!(!monitor.stats().enabled);
        assert!(monitor.statistics().contains("Roster check: disabled"));

        monitor.start();
        let interval = monitor.config().health.check_interval();
        tokio::time::sleep(interval * 3 + Duration::from_secs(1)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        assert!(!monitor.set_enabled(true));
        // The next tick queues alice; the flush tick sends her once max_wait passes.
        tokio::time::sleep(interval + Duration::from_secs(5)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        monitor.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_reload_switches_roster_check() {
        let monitor = monitor();
        let mut config = MonitorConfig::default();
        config.health.monitoring_enabled = false;
        monitor.apply_config(config).await;
        assert!(!monitor.is_enabled());
    }

    #[tokio::test]
    async fn test_reset_member_forgets_entity() {
        let monitor = monitor();
        assert_eq!(monitor.reset_member(""), Err(QueryError::EmptyName));
        assert_eq!(monitor.reset_member("alice"), Ok(false));

        let _ = monitor.request_status("alice");
        monitor.flush_pending().await;
        assert!(monitor.cache().peek("alice").is_some());

        assert_eq!(monitor.reset_member("  alice "), Ok(true));
        assert!(monitor.cache().peek("alice").is_none());
        assert!(monitor.health().get_stats("alice").is_none());
        assert_eq!(monitor.detector().previous("alice"), None);
        assert_eq!(monitor.reset_member("alice"), Ok(false));
    }

    #[tokio::test]
    async fn test_sync_group_bypasses_cache() {
        let (monitor, provider) = switchable_monitor();
        assert_eq!(monitor.sync_group("ops").await, "No subscriptions for ops");

        monitor.add_subscription("ops", "alice").unwrap();
        monitor.add_subscription("ops", "bob").unwrap();
        monitor.flush_pending().await;

        let text = monitor.sync_group("ops").await;
        assert!(text.starts_with("Sync of ops (2)"));
        assert!(text.contains("- alice: online (no change)"));
        assert!(text.ends_with("Synced 2 of 2, 0 changed"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        provider.offline.store(true, Ordering::SeqCst);
        assert!(monitor.request_status("bob").is_ready());
        let text = monitor.sync_group("ops").await;
        assert!(text.contains("- bob: online -> offline, cached online"));
        assert!(text.ends_with("Synced 2 of 2, 2 changed"));
        assert_eq!(monitor.cache().peek("bob").unwrap().status, Status::Offline);
    }
}
