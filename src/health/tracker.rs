//! Per-entity failure tracking and cooldown scheduling.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::HealthConfig;
use crate::observability::metrics;
use crate::resilience::cooldown::{cooldown_for, deadline};

/// Thresholds that decide when an entity is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures before a cooldown is applied.
    pub failure_threshold: u32,
    pub cooldown_base: Duration,
    pub cooldown_cap: Duration,
    /// Stats unseen for this long are dropped by [`HealthTracker::cleanup_idle`].
    pub retention: Duration,
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            cooldown_base: config.cooldown_base(),
            cooldown_cap: config.cooldown_cap(),
            retention: config.stats_retention(),
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

/// Check history of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStats {
    /// Reset to zero by any success.
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub total_failures: u64,
    /// Only set while `consecutive_failures >= failure_threshold`.
    pub next_eligible_check_at: Option<Instant>,
    pub last_checked_at: Instant,
}

impl HealthStats {
    fn new(now: Instant) -> Self {
        Self {
            consecutive_failures: 0,
            total_checks: 0,
            total_failures: 0,
            next_eligible_check_at: None,
            last_checked_at: now,
        }
    }

    /// Time left before the entity may be checked again.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.next_eligible_check_at
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Lifetime failure ratio in `[0, 1]`.
    pub fn failure_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_checks as f64
        }
    }
}

/// Aggregate view over all tracked entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthSummary {
    pub tracked: usize,
    /// Entities with at least one consecutive failure.
    pub failing: usize,
    pub in_cooldown: usize,
    pub total_checks: u64,
    pub total_failures: u64,
}

/// Decides whether an entity is worth querying right now.
///
/// Purely local bookkeeping, it never touches the network.
#[derive(Debug)]
pub struct HealthTracker {
    stats: DashMap<String, HealthStats>,
    policy: ArcSwap<HealthPolicy>,
}

impl HealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            stats: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn policy(&self) -> HealthPolicy {
        **self.policy.load()
    }

    /// Swap thresholds at runtime; existing cooldowns keep their deadline.
    pub fn set_policy(&self, policy: HealthPolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn record_success(&self, name: &str) {
        let now = Instant::now();
        let mut stats = self
            .stats
            .entry(name.to_string())
            .or_insert_with(|| HealthStats::new(now));

        if stats.consecutive_failures > 0 {
            tracing::debug!(
                name = %name,
                failures = stats.consecutive_failures,
                "Entity recovered"
            );
        }
        stats.total_checks += 1;
        stats.consecutive_failures = 0;
        stats.next_eligible_check_at = None;
        stats.last_checked_at = now;
    }

    /// Count a failure; returns the cooldown if one is now in force.
    pub fn record_failure(&self, name: &str) -> Option<Duration> {
        let policy = self.policy();
        let now = Instant::now();
        let mut stats = self
            .stats
            .entry(name.to_string())
            .or_insert_with(|| HealthStats::new(now));

        stats.total_checks += 1;
        stats.total_failures += 1;
        stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
        stats.last_checked_at = now;

        if stats.consecutive_failures < policy.failure_threshold {
            return None;
        }

        let cooldown = cooldown_for(
            stats.consecutive_failures,
            policy.cooldown_base,
            policy.cooldown_cap,
        );
        stats.next_eligible_check_at = Some(deadline(now, cooldown));
        metrics::record_cooldown();
        tracing::warn!(
            name = %name,
            failures = stats.consecutive_failures,
            cooldown_secs = cooldown.as_secs(),
            "Entity entered cooldown"
        );
        Some(cooldown)
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        let policy = self.policy();
        let now = Instant::now();
        match self.stats.get(name) {
            Some(stats) => {
                let cooling = stats
                    .next_eligible_check_at
                    .is_some_and(|until| now < until);
                !(stats.consecutive_failures >= policy.failure_threshold && cooling)
            }
            None => true,
        }
    }

    pub fn get_stats(&self, name: &str) -> Option<HealthStats> {
        self.stats.get(name).map(|stats| stats.value().clone())
    }

    pub fn reset(&self, name: &str) -> bool {
        self.stats.remove(name).is_some()
    }

    pub fn reset_all(&self) {
        self.stats.clear();
    }

    /// Drop stats for entities not checked within the retention window.
    pub fn cleanup_idle(&self) -> usize {
        let retention = self.policy().retention;
        let now = Instant::now();
        let before = self.stats.len();
        self.stats
            .retain(|_, stats| now.saturating_duration_since(stats.last_checked_at) < retention);
        before.saturating_sub(self.stats.len())
    }

    pub fn summary(&self) -> HealthSummary {
        let now = Instant::now();
        let mut summary = HealthSummary::default();
        for stats in self.stats.iter() {
            summary.tracked += 1;
            if stats.consecutive_failures > 0 {
                summary.failing += 1;
            }
            if stats.cooldown_remaining(now).is_some() {
                summary.in_cooldown += 1;
            }
            summary.total_checks += stats.total_checks;
            summary.total_failures += stats.total_failures;
        }
        summary
    }
}
