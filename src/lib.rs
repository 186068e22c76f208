//! Batched presence monitoring library.

pub mod admin;
pub mod batch;
pub mod changes;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod scheduler;
pub mod status;
pub mod subscriptions;

pub use config::schema::MonitorConfig;
pub use error::MonitorError;
pub use lifecycle::Shutdown;
pub use monitor::PresenceMonitor;
