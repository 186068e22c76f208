//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Per-entity (tracker.rs):
//!     Batch outcome for a name
//!     → record_success / record_failure
//!     → cooldown once consecutive failures >= threshold
//!     → roster check asks is_eligible before querying
//!
//! System-wide (system.rs):
//!     Roster check cycle finished
//!     → aggregate failure rate
//!     → rate-limited warning to every subscriber group
//! ```
//!
//! # Design Decisions
//! - Stats are keyed by entity name, independent of subscriptions
//! - Cooldown is linear in consecutive failures and capped
//! - Skipped entities are logged at debug only

pub mod system;
pub mod tracker;

pub use system::{CycleReport, DegradationAlert, SystemHealthMonitor};
pub use tracker::{HealthPolicy, HealthStats, HealthSummary, HealthTracker};
