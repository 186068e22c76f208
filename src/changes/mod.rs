//! Change detection.
//!
//! # Data Flow
//! ```text
//! successful observation (after cache write and waiter completion)
//!     → detector.rs observe
//!     → TransitionEvent (online ↔ offline only)
//!     → notify::NotificationDispatcher
//! ```
//!
//! # Design Decisions
//! - Previous status survives cache eviction
//! - First observation seeds without notifying
//! - Failed queries never reach the detector

pub mod detector;

pub use detector::{ChangeDetector, StatusRecord};
