//! Batched status queries.
//!
//! # Data Flow
//! ```text
//! request_status(name)
//!     → cache hit: ready future
//!     → pending.rs PendingQuery (new, or caller attached to existing)
//!     → size >= batch_size: spawned flush
//!
//! flush tick
//!     → coordinator.rs flush_due (oldest query waited >= max_wait)
//!
//! flush
//!     → drain (single claimant) → provider.query_batch
//!     → per name: cache + health → waiters → change detector → sink
//! ```
//!
//! # Design Decisions
//! - A name in flight is not joined; new callers start the next batch
//! - Only the drain is exclusive; batches may overlap on the provider
//! - Failures are recorded against health and never cached

pub mod coordinator;
pub mod pending;

pub use coordinator::{BatchQueryCoordinator, BatchSettings, BatchStats, TransitionSink};
pub use pending::{PendingQuery, StatusFuture};
