//! Group → names mapping with a reverse index.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::status::normalize_name;
use crate::subscriptions::store::{SubscriptionConfig, SubscriptionPersister, SubscriptionStore};

/// Result of an add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    Added,
    AlreadyPresent,
    Removed,
    NotFound,
}

impl SubscriptionChange {
    /// Whether the registry was modified.
    pub fn is_change(self) -> bool {
        matches!(self, SubscriptionChange::Added | SubscriptionChange::Removed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionChange::Added => "added",
            SubscriptionChange::AlreadyPresent => "already_present",
            SubscriptionChange::Removed => "removed",
            SubscriptionChange::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("group id must not be empty")]
    EmptyGroup,

    #[error("entity name must not be empty")]
    EmptyName,
}

/// Which groups watch which entities.
///
/// Reads are lock-free. Mutations are serialized so both indexes and the
/// published snapshot move together. Removing the last watcher of a name
/// does not touch its cached status or health.
pub struct SubscriptionRegistry {
    by_group: DashMap<String, BTreeSet<String>>,
    by_name: DashMap<String, BTreeSet<String>>,
    write: Mutex<()>,
    snapshots: watch::Sender<Arc<Vec<SubscriptionConfig>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_group: DashMap::new(),
            by_name: DashMap::new(),
            write: Mutex::new(()),
            snapshots,
        }
    }

    /// Build from loaded subscriptions. Blank ids and names are skipped.
    pub fn with_subscriptions(subscriptions: Vec<SubscriptionConfig>) -> Self {
        let registry = Self::new();
        for config in subscriptions {
            let Ok(group) = normalize_name(&config.group_id) else {
                tracing::warn!("Skipping subscription group with empty id");
                continue;
            };
            for name in config.member_names {
                if let Ok(name) = normalize_name(&name) {
                    registry.insert(&group, &name);
                }
            }
        }
        registry.snapshots.send_replace(Arc::new(registry.snapshot()));
        registry
    }

    /// Idempotent; returns `AlreadyPresent` when nothing changed.
    pub fn add_subscription(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<SubscriptionChange, SubscriptionError> {
        let (group, name) = normalize_pair(group_id, name)?;
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());

        if !self.insert(&group, &name) {
            return Ok(SubscriptionChange::AlreadyPresent);
        }
        tracing::info!(group = %group, name = %name, "Subscription added");
        self.publish();
        Ok(SubscriptionChange::Added)
    }

    /// Idempotent; returns `NotFound` when nothing changed.
    pub fn remove_subscription(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<SubscriptionChange, SubscriptionError> {
        let (group, name) = normalize_pair(group_id, name)?;
        let _guard = self.write.lock().unwrap_or_else(|e| e.into_inner());

        let removed = self
            .by_group
            .get_mut(&group)
            .map(|mut names| names.remove(&name))
            .unwrap_or(false);
        if !removed {
            return Ok(SubscriptionChange::NotFound);
        }
        self.by_group.remove_if(&group, |_, names| names.is_empty());

        if let Some(mut groups) = self.by_name.get_mut(&name) {
            groups.remove(&group);
        }
        self.by_name.remove_if(&name, |_, groups| groups.is_empty());

        tracing::info!(group = %group, name = %name, "Subscription removed");
        self.publish();
        Ok(SubscriptionChange::Removed)
    }

    fn insert(&self, group: &str, name: &str) -> bool {
        let added = self
            .by_group
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string());
        if added {
            self.by_name
                .entry(name.to_string())
                .or_default()
                .insert(group.to_string());
        }
        added
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.snapshot()));
    }

    pub fn groups_watching(&self, name: &str) -> BTreeSet<String> {
        self.by_name
            .get(name.trim())
            .map(|groups| groups.clone())
            .unwrap_or_default()
    }

    pub fn names_for(&self, group_id: &str) -> BTreeSet<String> {
        self.by_group
            .get(group_id.trim())
            .map(|names| names.clone())
            .unwrap_or_default()
    }

    /// Every name watched by at least one group.
    pub fn all_names(&self) -> BTreeSet<String> {
        self.by_name.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn groups(&self) -> BTreeSet<String> {
        self.by_group.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }

    pub fn name_count(&self) -> usize {
        self.by_name.len()
    }

    /// Subscriptions sorted by group id.
    pub fn snapshot(&self) -> Vec<SubscriptionConfig> {
        let mut configs: Vec<SubscriptionConfig> = self
            .by_group
            .iter()
            .map(|entry| SubscriptionConfig {
                group_id: entry.key().clone(),
                member_names: entry.value().clone(),
            })
            .collect();
        configs.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        configs
    }

    /// Snapshots published after every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<SubscriptionConfig>>> {
        self.snapshots.subscribe()
    }

    pub fn persister(&self, store: Arc<dyn SubscriptionStore>) -> SubscriptionPersister {
        SubscriptionPersister::new(self.subscribe(), store)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_pair(group_id: &str, name: &str) -> Result<(String, String), SubscriptionError> {
    let group = normalize_name(group_id).map_err(|_| SubscriptionError::EmptyGroup)?;
    let name = normalize_name(name).map_err(|_| SubscriptionError::EmptyName)?;
    Ok((group, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.add_subscription("ops", "alice"),
            Ok(SubscriptionChange::Added)
        );
        assert_eq!(
            registry.add_subscription("ops", " alice "),
            Ok(SubscriptionChange::AlreadyPresent)
        );
        assert_eq!(
            registry.remove_subscription("ops", "alice"),
            Ok(SubscriptionChange::Removed)
        );
        assert_eq!(
            registry.remove_subscription("ops", "alice"),
            Ok(SubscriptionChange::NotFound)
        );
        assert_eq!(registry.group_count(), 0);
        assert_eq!(registry.name_count(), 0);
    }

    #[test]
    fn test_reverse_index() {
        let registry = SubscriptionRegistry::new();
        registry.add_subscription("ops", "alice").unwrap();
        registry.add_subscription("dev", "alice").unwrap();
        registry.add_subscription("dev", "bob").unwrap();

        let watching: Vec<_> = registry.groups_watching("alice").into_iter().collect();
        assert_eq!(watching, vec!["dev", "ops"]);
        assert_eq!(registry.names_for("dev").len(), 2);
        assert_eq!(registry.all_names().len(), 2);

        registry.remove_subscription("ops", "alice").unwrap();
        let watching: Vec<_> = registry.groups_watching("alice").into_iter().collect();
        assert_eq!(watching, vec!["dev"]);
        assert!(registry.names_for("ops").is_empty());
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.add_subscription(" ", "alice"),
            Err(SubscriptionError::EmptyGroup)
        );
        assert_eq!(
            registry.add_subscription("ops", ""),
            Err(SubscriptionError::EmptyName)
        );
    }

    #[test]
    fn test_changes_publish_snapshots() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.subscribe();

        registry.add_subscription("ops", "alice").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        registry.add_subscription("ops", "alice").unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_loaded_subscriptions_are_normalized() {
        let registry = SubscriptionRegistry::with_subscriptions(vec![
            SubscriptionConfig {
                group_id: " ops ".into(),
                member_names: [" alice".to_string(), "  ".to_string()].into_iter().collect(),
            },
            SubscriptionConfig {
                group_id: "".into(),
                member_names: ["bob".to_string()].into_iter().collect(),
            },
        ]);

        assert_eq!(registry.groups().into_iter().collect::<Vec<_>>(), vec!["ops"]);
        assert!(registry.names_for("ops").contains("alice"));
        assert_eq!(registry.name_count(), 1);
    }
}
