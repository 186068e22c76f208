//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MonitorConfig (validated, immutable)
//!     → split into per-component settings at wiring time
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → PresenceMonitor::apply_config swaps settings
//!     → periodic ticks re-registered with new intervals
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use watcher::ConfigWatcher;
pub use schema::{
    AdminConfig, BatchConfig, CacheConfig, HealthConfig, MonitorConfig, NotificationConfig,
    ObservabilityConfig, PersistenceConfig, ProviderConfig,
};
