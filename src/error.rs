//! Crate-level error type.

use crate::config::ConfigError;
use crate::notify::DeliveryError;
use crate::provider::ProviderError;
use crate::subscriptions::{StoreError, SubscriptionError};

/// Errors surfaced by startup and the caller-facing API.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid subscription: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("subscription store error: {0}")]
    Store(#[from] StoreError),

    #[error("status provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("messenger error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
