//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Logging/metrics → Collaborators → Load subscriptions
//!     → Prime → Start ticks → Admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel ticks → Broadcast shutdown
//!     → Final flush → Wait for batches in flight → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Batches in flight are never cancelled; their results are applied
//! - Shutdown has timeout: exit after the deadline even if a batch hangs

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::SignalEvent;
