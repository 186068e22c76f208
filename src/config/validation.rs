//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes >= 1, intervals within bounds, rates in [0, 1])
//! - Validate URLs and socket addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on reload
//! - Every interval has an upper bound so deadline arithmetic stays in range

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{MonitorConfig, PLACEHOLDER_API_KEY};

const HOUR_MS: u64 = 3_600_000;
const WEEK_SECS: u64 = 7 * 24 * 3600;
const WEEK_MINS: u64 = 7 * 24 * 60;
const QUARTER_HOURS: u64 = 90 * 24;
const TEN_MINUTES_SECS: u64 = 600;
const TEN_MINUTES_MS: u64 = 600_000;
const MAX_ATTEMPTS: u32 = 10;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_range(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) {
    if value < min || value > max {
        errors.push(ValidationError::new(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
}

pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.batch.batch_size == 0 {
        errors.push(ValidationError::new("batch.batch_size", "must be at least 1"));
    }
    check_range(&mut errors, "batch.max_wait_ms", config.batch.max_wait_ms, 1, HOUR_MS);
    check_range(&mut errors, "batch.flush_tick_ms", config.batch.flush_tick_ms, 1, HOUR_MS);

    check_range(&mut errors, "cache.ttl_secs", config.cache.ttl_secs, 1, WEEK_SECS);
    check_range(
        &mut errors,
        "cache.cleanup_interval_secs",
        config.cache.cleanup_interval_secs,
        1,
        WEEK_SECS,
    );

    let health = &config.health;
    if health.failure_threshold == 0 {
        errors.push(ValidationError::new("health.failure_threshold", "must be at least 1"));
    }
    check_range(
        &mut errors,
        "health.cooldown_base_mins",
        health.cooldown_base_mins,
        1,
        WEEK_MINS,
    );
    if health.cooldown_cap_mins < health.cooldown_base_mins {
        errors.push(ValidationError::new(
            "health.cooldown_cap_mins",
            format!("must be >= cooldown_base_mins ({})", health.cooldown_base_mins),
        ));
    } else if health.cooldown_cap_mins > WEEK_MINS {
        errors.push(ValidationError::new(
            "health.cooldown_cap_mins",
            format!("must be at most {}", WEEK_MINS),
        ));
    }
    check_range(
        &mut errors,
        "health.stats_retention_hours",
        health.stats_retention_hours,
        1,
        QUARTER_HOURS,
    );
    check_range(
        &mut errors,
        "health.check_interval_secs",
        health.check_interval_secs,
        1,
        WEEK_SECS,
    );
    if !(0.0..=1.0).contains(&health.failure_rate_threshold) {
        errors.push(ValidationError::new(
            "health.failure_rate_threshold",
            "must be between 0.0 and 1.0",
        ));
    }
    check_range(
        &mut errors,
        "health.warning_interval_mins",
        health.warning_interval_mins,
        0,
        WEEK_MINS,
    );

    let provider = &config.provider;
    if let Err(e) = Url::parse(&provider.endpoint) {
        errors.push(ValidationError::new("provider.endpoint", format!("invalid URL: {}", e)));
    }
    if provider.max_attempts == 0 || provider.max_attempts > MAX_ATTEMPTS {
        errors.push(ValidationError::new(
            "provider.max_attempts",
            format!("must be between 1 and {}", MAX_ATTEMPTS),
        ));
    }
    check_range(
        &mut errors,
        "provider.timeout_secs",
        provider.timeout_secs,
        1,
        TEN_MINUTES_SECS,
    );
    check_range(
        &mut errors,
        "provider.base_delay_ms",
        provider.base_delay_ms,
        0,
        TEN_MINUTES_MS,
    );
    if provider.max_delay_ms < provider.base_delay_ms {
        errors.push(ValidationError::new(
            "provider.max_delay_ms",
            "must be >= base_delay_ms",
        ));
    } else if provider.max_delay_ms > TEN_MINUTES_MS {
        errors.push(ValidationError::new(
            "provider.max_delay_ms",
            format!("must be at most {}", TEN_MINUTES_MS),
        ));
    }

    if let Some(webhook) = &config.notification.webhook_url {
        if let Err(e) = Url::parse(webhook) {
            errors.push(ValidationError::new(
                "notification.webhook_url",
                format!("invalid URL: {}", e),
            ));
        }
    }
    check_range(
        &mut errors,
        "notification.timeout_secs",
        config.notification.timeout_secs,
        1,
        TEN_MINUTES_SECS,
    );

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
        }
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(config: &MonitorConfig) -> Vec<&'static str> {
        validate_config(config)
            .unwrap_err()
            .iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&MonitorConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = MonitorConfig::default();
        config.batch.batch_size = 0;
        config.health.cooldown_base_mins = 10;
        config.health.cooldown_cap_mins = 5;
        config.health.failure_rate_threshold = 1.5;
        config.provider.endpoint = "not a url".to_string();

        assert_eq!(
            fields(&config),
            vec![
                "batch.batch_size",
                "health.cooldown_cap_mins",
                "health.failure_rate_threshold",
                "provider.endpoint",
            ]
        );
    }

    #[test]
    fn test_intervals_are_bounded() {
        let mut config = MonitorConfig::default();
        config.health.failure_threshold = 1;
        config.health.cooldown_base_mins = 300_000_000_000_000_000;
        config.health.cooldown_cap_mins = 300_000_000_000_000_000;
        config.cache.ttl_secs = u64::MAX;
        config.batch.max_wait_ms = 0;

        assert_eq!(
            fields(&config),
            vec![
                "batch.max_wait_ms",
                "cache.ttl_secs",
                "health.cooldown_base_mins",
                "health.cooldown_cap_mins",
            ]
        );
    }

    #[test]
    fn test_week_long_cooldown_is_accepted() {
        let mut config = MonitorConfig::default();
        config.health.cooldown_base_mins = WEEK_MINS;
        config.health.cooldown_cap_mins = WEEK_MINS;
        config.cache.ttl_secs = WEEK_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_requires_real_key() {
        let mut config = MonitorConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
