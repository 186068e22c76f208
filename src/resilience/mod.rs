//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider batch call fails (transport, timeout, 5xx):
//!     → backoff.rs (delay before the next attempt)
//!
//! Entity keeps failing across cycles:
//!     → cooldown.rs (how long the scheduler skips it)
//! ```
//!
//! # Design Decisions
//! - Retries belong to the provider call; cooldown belongs to the entity
//! - Both delays are capped by configuration

pub mod backoff;
pub mod cooldown;
