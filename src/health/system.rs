//! System-wide degradation alerting.
//!
//! Per-entity failures are handled by the tracker. This module looks at a
//! whole roster check cycle and raises one rate-limited warning when the
//! aggregate failure rate is too high.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::HealthConfig;
use crate::observability::metrics;

/// Outcome counts of one roster check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Names that needed a provider query.
    pub checked: usize,
    /// Names answered by a fresh cache entry; not part of the failure rate.
    pub cached: usize,
    /// Names skipped because they are cooling down.
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn failure_rate(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            self.failed as f64 / self.checked as f64
        }
    }
}

/// Alert raised when a cycle crosses the failure-rate threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationAlert {
    pub failure_rate: f64,
    pub failed: usize,
    pub checked: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AlertPolicy {
    enabled: bool,
    threshold: f64,
    interval: Duration,
}

/// Rate-limited evaluator of cycle reports.
#[derive(Debug)]
pub struct SystemHealthMonitor {
    policy: Mutex<AlertPolicy>,
    last_alert: Mutex<Option<Instant>>,
}

impl SystemHealthMonitor {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            policy: Mutex::new(Self::policy_from(config)),
            last_alert: Mutex::new(None),
        }
    }

    fn policy_from(config: &HealthConfig) -> AlertPolicy {
        AlertPolicy {
            enabled: config.warning_enabled,
            threshold: config.failure_rate_threshold,
            interval: config.warning_interval(),
        }
    }

    pub fn reconfigure(&self, config: &HealthConfig) {
        *self.policy.lock().unwrap_or_else(|e| e.into_inner()) = Self::policy_from(config);
    }

    /// Returns an alert when the cycle is degraded and none was raised
    /// within the warning interval.
    pub fn evaluate(&self, report: &CycleReport) -> Option<DegradationAlert> {
        let policy = *self.policy.lock().unwrap_or_else(|e| e.into_inner());
        if !policy.enabled || report.checked == 0 {
            return None;
        }

        let rate = report.failure_rate();
        if rate <= policy.threshold {
            return None;
        }

        let now = Instant::now();
        let mut last = self.last_alert.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < policy.interval {
                tracing::debug!(failure_rate = rate, "Degradation alert suppressed");
                return None;
            }
        }
        *last = Some(now);
        metrics::record_health_warning();

        Some(DegradationAlert {
            failure_rate: rate,
            failed: report.failed,
            checked: report.checked,
        })
    }
}
