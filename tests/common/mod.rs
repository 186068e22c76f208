//! Shared test doubles for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use presence_monitor::config::MonitorConfig;
use presence_monitor::notify::{DeliveryError, Messenger};
use presence_monitor::provider::{ProviderError, ProviderRecord, StatusProvider};
use presence_monitor::status::Status;
use presence_monitor::subscriptions::SubscriptionRegistry;
use presence_monitor::PresenceMonitor;

/// Provider answering from a mutable table. Names not in the table are
/// left out of the response.
#[derive(Default)]
pub struct ScriptedProvider {
    table: Mutex<HashMap<String, Result<Status, String>>>,
    calls: Mutex<Vec<Vec<String>>>,
    fail_all: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, name: &str, status: Status) {
        self.table
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(status));
    }

    pub fn set_failure(&self, name: &str, reason: &str) {
        self.table
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(reason.to_string()));
    }

    pub fn forget(&self, name: &str) {
        self.table.lock().unwrap().remove(name);
    }

    /// Fail every call as a whole until turned off again.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Block calls until permits are added to the returned semaphore.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// How many calls asked for `name`.
    pub fn times_queried(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.iter().any(|n| n == name))
            .count()
    }
}

#[async_trait]
impl StatusProvider for ScriptedProvider {
    async fn query_batch(&self, names: &[String]) -> Result<Vec<ProviderRecord>, ProviderError> {
        let mut sorted = names.to_vec();
        sorted.sort();
        self.calls.lock().unwrap().push(sorted);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection refused".into()));
        }

        let table = self.table.lock().unwrap();
        Ok(names
            .iter()
            .filter_map(|name| {
                table.get(name).map(|outcome| match outcome {
                    Ok(status) => ProviderRecord::success(
                        name.clone(),
                        *status,
                        Some(format!("{{\"name\":\"{}\",\"status\":\"{}\"}}", name, status)),
                    ),
                    Err(reason) => ProviderRecord::failure(name.clone(), reason.clone()),
                })
            })
            .collect())
    }
}

/// Messenger recording deliveries; deliveries to `failing` groups error.
#[derive(Default)]
pub struct RecordingMessenger {
    failing: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_group(&self, group: &str) {
        self.failing.lock().unwrap().insert(group.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, group: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(destination, _)| destination == group)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(destination) {
            return Err(DeliveryError::Failed {
                destination: destination.to_string(),
                reason: "chat unavailable".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

/// Defaults with a custom batch size and ticks that stay out of the way.
pub fn config(batch_size: usize) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.batch.batch_size = batch_size;
    config.health.check_interval_secs = 24 * 3600;
    config
}

pub fn build_monitor(
    config: MonitorConfig,
    provider: &Arc<ScriptedProvider>,
    messenger: &Arc<RecordingMessenger>,
) -> Arc<PresenceMonitor> {
    PresenceMonitor::new(
        config,
        provider.clone(),
        messenger.clone(),
        Arc::new(SubscriptionRegistry::new()),
    )
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
