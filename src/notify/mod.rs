//! Notifications to subscriber groups.
//!
//! # Data Flow
//! ```text
//! TransitionEvent
//!     → dispatcher.rs groups_watching(name)
//!     → format.rs transition text
//!     → messenger.rs notify(group, text), one task per group
//!
//! DegradationAlert
//!     → format.rs degradation text → dispatcher.rs broadcast
//! ```
//!
//! # Design Decisions
//! - Best effort: failed deliveries are logged and counted, not retried
//! - Delivery never feeds back into the query path

pub mod dispatcher;
pub mod format;
pub mod messenger;

pub use dispatcher::{Dispatch, DispatchSummary, NotificationDispatcher};
pub use messenger::{DeliveryError, LogMessenger, Messenger, WebhookMessenger};
