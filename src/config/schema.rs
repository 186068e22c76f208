//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the presence monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Query batching.
    pub batch: BatchConfig,

    /// Status cache.
    pub cache: CacheConfig,

    /// Per-entity health tracking and system health warnings.
    pub health: HealthConfig,

    /// External status provider.
    pub provider: ProviderConfig,

    /// Outbound notifications.
    pub notification: NotificationConfig,

    /// Subscription persistence.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API.
    pub admin: AdminConfig,
}

/// Batch query configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Pending names that trigger an immediate flush.
    pub batch_size: usize,

    /// Longest a queued name waits for a flush, in milliseconds.
    pub max_wait_ms: u64,

    /// Interval of the flush tick in milliseconds.
    pub flush_tick_ms: u64,
}

impl BatchConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn flush_tick(&self) -> Duration {
        Duration::from_millis(self.flush_tick_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_wait_ms: 3_000,
            flush_tick_ms: 500,
        }
    }
}

/// Status cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Time an observation stays fresh, in seconds.
    pub ttl_secs: u64,

    /// Interval of the cleanup tick in seconds.
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            cleanup_interval_secs: 300,
        }
    }
}

/// Health tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the roster check. Can also be switched at runtime.
    pub monitoring_enabled: bool,

    /// Consecutive failures before an entity is put into cooldown.
    pub failure_threshold: u32,

    /// Cooldown added per consecutive failure, in minutes.
    pub cooldown_base_mins: u64,

    /// Upper bound of the cooldown, in minutes.
    pub cooldown_cap_mins: u64,

    /// Health stats unseen for this long are dropped, in hours.
    pub stats_retention_hours: u64,

    /// Interval of the roster health-check tick in seconds.
    pub check_interval_secs: u64,

    /// Cycle failure rate above which a system warning is sent (0.0 - 1.0).
    pub failure_rate_threshold: f64,

    /// Send system health warnings to subscriber groups.
    pub warning_enabled: bool,

    /// Minimum time between two system warnings, in minutes.
    pub warning_interval_mins: u64,
}

impl HealthConfig {
    pub fn cooldown_base(&self) -> Duration {
        Duration::from_secs(self.cooldown_base_mins.saturating_mul(60))
    }

    pub fn cooldown_cap(&self) -> Duration {
        Duration::from_secs(self.cooldown_cap_mins.saturating_mul(60))
    }

    pub fn stats_retention(&self) -> Duration {
        Duration::from_secs(self.stats_retention_hours.saturating_mul(3600))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn warning_interval(&self) -> Duration {
        Duration::from_secs(self.warning_interval_mins.saturating_mul(60))
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            failure_threshold: 3,
            cooldown_base_mins: 5,
            cooldown_cap_mins: 60,
            stats_retention_hours: 24,
            check_interval_secs: 60,
            failure_rate_threshold: 0.5,
            warning_enabled: true,
            warning_interval_mins: 30,
        }
    }
}

/// Status provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Batch status endpoint (POST).
    pub endpoint: String,

    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per batch call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8700/status/batch".to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook receiving `{destination, text}`; log-only when unset.
    pub webhook_url: Option<String>,

    /// Delivery timeout in seconds.
    pub timeout_secs: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 5,
        }
    }
}

/// Subscription persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON file holding subscriptions; in-memory only when unset.
    pub subscriptions_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key rejected by validation when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [batch]
            batch_size = 10

            [health]
            failure_threshold = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.max_wait_ms, 3_000);
        assert_eq!(config.health.failure_threshold, 5);
        assert_eq!(config.health.cooldown_base(), Duration::from_secs(300));
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert!(config.notification.webhook_url.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }
}
