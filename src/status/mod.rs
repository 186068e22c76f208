//! Entity status model and cache.
//!
//! # Data Flow
//! ```text
//! provider result (success)
//!     → cache.rs put (write-through, fresh TTL)
//!     → StatusEntry handed to waiters
//!
//! caller request
//!     → cache.rs get (hit: answered immediately, miss: batched)
//!
//! cleanup tick
//!     → cache.rs cleanup_expired
//! ```
//!
//! # Design Decisions
//! - Failed queries never touch the cache
//! - Reads never remove; expiry is reclaimed by the cleanup tick only

pub mod cache;
pub mod types;

pub use cache::{CacheStats, StatusCache};
pub use types::{normalize_name, QueryError, Status, StatusEntry, StatusResult, TransitionEvent};
