//! Subscriber groups and their watched entities.
//!
//! # Data Flow
//! ```text
//! startup:  store.load → registry.rs with_subscriptions
//! change:   registry.rs add/remove → watch snapshot
//!               → store.rs SubscriptionPersister → store.save
//! dispatch: registry.rs groups_watching(name)
//! ```

pub mod registry;
pub mod store;

pub use registry::{SubscriptionChange, SubscriptionError, SubscriptionRegistry};
pub use store::{
    InMemoryStore, JsonFileStore, StoreError, SubscriptionConfig, SubscriptionPersister,
    SubscriptionStore,
};
