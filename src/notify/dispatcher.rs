//! Fan-out of transitions to subscriber groups.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::batch::TransitionSink;
use crate::notify::format;
use crate::notify::messenger::Messenger;
use crate::observability::metrics;
use crate::status::TransitionEvent;
use crate::subscriptions::SubscriptionRegistry;

/// Delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Deliveries started by one dispatch, one task per group.
#[derive(Debug)]
pub struct Dispatch {
    handles: Vec<JoinHandle<bool>>,
}

impl Dispatch {
    pub fn groups(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every delivery of this dispatch.
    pub async fn settled(self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for handle in self.handles {
            match handle.await {
                Ok(true) => summary.delivered += 1,
                Ok(false) | Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Sends transition and warning messages to every interested group.
///
/// Each group is delivered to on its own task, so a slow or failing group
/// does not hold up the others. Failures are logged and counted, never
/// retried.
pub struct NotificationDispatcher {
    registry: Arc<SubscriptionRegistry>,
    messenger: Arc<dyn Messenger>,
    counters: Arc<Counters>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            registry,
            messenger,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn dispatch(&self, event: &TransitionEvent) -> Dispatch {
        let groups = self.registry.groups_watching(&event.name);
        if groups.is_empty() {
            tracing::debug!(name = %event.name, "Transition has no subscribers");
        }
        self.send_all(groups, format::transition(event))
    }

    /// Send `text` to every known group.
    pub fn broadcast(&self, text: String) -> Dispatch {
        self.send_all(self.registry.groups(), text)
    }

    fn send_all(&self, groups: impl IntoIterator<Item = String>, text: String) -> Dispatch {
        let text: Arc<str> = Arc::from(text);
        let handles = groups
            .into_iter()
            .map(|group| {
                let messenger = Arc::clone(&self.messenger);
                let counters = Arc::clone(&self.counters);
                let text = Arc::clone(&text);
                tokio::spawn(async move {
                    match messenger.notify(&group, &text).await {
                        Ok(()) => {
                            counters.delivered.fetch_add(1, Ordering::Relaxed);
                            metrics::record_notification(true);
                            true
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            metrics::record_notification(false);
                            tracing::warn!(group = %group, error = %e, "Notification delivery failed");
                            false
                        }
                    }
                })
            })
            .collect();
        Dispatch { handles }
    }

    /// Totals since start or the last reset.
    pub fn stats(&self) -> DispatchSummary {
        DispatchSummary {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.counters.delivered.store(0, Ordering::Relaxed);
        self.counters.failed.store(0, Ordering::Relaxed);
    }
}

impl TransitionSink for NotificationDispatcher {
    fn on_transition(&self, event: TransitionEvent) {
        let dispatch = self.dispatch(&event);
        tracing::debug!(name = %event.name, groups = dispatch.groups(), "Transition dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::messenger::DeliveryError;
    use crate::status::Status;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inbox {
        failing: Vec<String>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Messenger for Inbox {
        async fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
            if self.failing.iter().any(|g| g == destination) {
                return Err(DeliveryError::Failed {
                    destination: destination.into(),
                    reason: "channel closed".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn event(name: &str) -> TransitionEvent {
        TransitionEvent {
            name: name.into(),
            previous_status: Status::Offline,
            new_status: Status::Online,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failing_group_does_not_block_others() {
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.add_subscription("a", "alice").unwrap();
        registry.add_subscription("b", "alice").unwrap();
        registry.add_subscription("c", "bob").unwrap();

        let inbox = Arc::new(Inbox {
            failing: vec!["a".into()],
            ..Inbox::default()
        });
        let dispatcher = NotificationDispatcher::new(registry, inbox.clone());

        let summary = dispatcher.dispatch(&event("alice")).settled().await;
        assert_eq!(summary, DispatchSummary { delivered: 1, failed: 1 });

        let sent = inbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "b");
        assert!(sent[0].1.starts_with("alice came online"));
        assert_eq!(dispatcher.stats(), summary);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_group() {
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.add_subscription("a", "alice").unwrap();
        registry.add_subscription("b", "bob").unwrap();
        let inbox = Arc::new(Inbox::default());
        let dispatcher = NotificationDispatcher::new(registry, inbox.clone());

        let summary = dispatcher.broadcast("degraded".into()).settled().await;
        assert_eq!(summary.delivered, 2);

        dispatcher.reset_stats();
        assert_eq!(dispatcher.stats(), DispatchSummary::default());
    }

    #[tokio::test]
    async fn test_unwatched_entity_sends_nothing() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(SubscriptionRegistry::new()),
            Arc::new(Inbox::default()),
        );
        let dispatch = dispatcher.dispatch(&event("nobody"));
        assert_eq!(dispatch.groups(), 0);
        assert_eq!(dispatch.settled().await, DispatchSummary::default());
    }
}
