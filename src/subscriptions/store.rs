//! Subscription persistence.
//!
//! # Responsibilities
//! - Load subscriptions at startup
//! - Save the latest snapshot after every change, off the caller's path
//!
//! # Design Decisions
//! - Saves run in one background task; a newer snapshot supersedes an unsaved one
//! - A failed save is logged and the in-memory registry stays authoritative
//! - File writes go to a temporary file first, then rename over the target

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};

/// Names one subscriber group watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub group_id: String,
    #[serde(default)]
    pub member_names: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn load(&self) -> Result<Vec<SubscriptionConfig>, StoreError>;

    async fn save(&self, subscriptions: &[SubscriptionConfig]) -> Result<(), StoreError>;
}

/// Pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<SubscriptionConfig>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No subscription file, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let subscriptions: Vec<SubscriptionConfig> = serde_json::from_slice(&bytes)?;
        tracing::info!(
            path = %self.path.display(),
            groups = subscriptions.len(),
            "Loaded subscriptions"
        );
        Ok(subscriptions)
    }

    async fn save(&self, subscriptions: &[SubscriptionConfig]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(subscriptions)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            groups = subscriptions.len(),
            "Saved subscriptions"
        );
        Ok(())
    }
}

/// Store that keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    saved: Mutex<Vec<SubscriptionConfig>>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<SubscriptionConfig>) -> Self {
        Self {
            saved: Mutex::new(subscriptions),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saved(&self) -> Vec<SubscriptionConfig> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn load(&self) -> Result<Vec<SubscriptionConfig>, StoreError> {
        Ok(self.saved())
    }

    async fn save(&self, subscriptions: &[SubscriptionConfig]) -> Result<(), StoreError> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = subscriptions.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Background task writing registry snapshots to a store.
pub struct SubscriptionPersister {
    snapshots: watch::Receiver<Arc<Vec<SubscriptionConfig>>>,
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionPersister {
    pub fn new(
        snapshots: watch::Receiver<Arc<Vec<SubscriptionConfig>>>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self { snapshots, store }
    }

    /// Save each new snapshot until shutdown; an unsaved snapshot is
    /// written before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = self.snapshots.borrow_and_update().clone();
                    self.save(&snapshot).await;
                }
                _ = shutdown.recv() => {
                    if self.snapshots.has_changed().unwrap_or(false) {
                        let snapshot = self.snapshots.borrow_and_update().clone();
                        self.save(&snapshot).await;
                    }
                    break;
                }
            }
        }
        tracing::debug!("Subscription persister stopped");
    }

    async fn save(&self, snapshot: &[SubscriptionConfig]) {
        if let Err(e) = self.store.save(snapshot).await {
            tracing::warn!(error = %e, "Failed to persist subscriptions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, names: &[&str]) -> SubscriptionConfig {
        SubscriptionConfig {
            group_id: id.to_string(),
            member_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("subs.json"));

        assert!(store.load().await.unwrap().is_empty());

        let subs = vec![group("ops", &["alice", "bob"]), group("dev", &["carol"])];
        store.save(&subs).await.unwrap();
        assert_eq!(store.load().await.unwrap(), subs);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }

    #[tokio::test]
    async fn test_persister_saves_latest_and_flushes_on_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        let (tx, rx) = watch::channel(Arc::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(SubscriptionPersister::new(rx, store.clone()).run(shutdown_rx));

        tx.send_replace(Arc::new(vec![group("ops", &["alice"])]));
        tokio::task::yield_now().await;
        tx.send_replace(Arc::new(vec![group("ops", &["alice", "bob"])]));
        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(store.saved(), vec![group("ops", &["alice", "bob"])]);
        assert!(store.save_count() >= 1);
    }
}
