//! Cancellable periodic tasks.
//!
//! # Responsibilities
//! - Run jobs on a fixed period, each on its own task
//! - Identify every task so it can be cancelled on its own
//!
//! # Design Decisions
//! - Cancellation is checked between runs; a running job always finishes
//! - A slow job delays the next tick instead of bursting to catch up
//! - The first run happens one period after scheduling

use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::resilience::cooldown::{deadline, MAX_HORIZON};

/// Identifier assigned to a task when it is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Description of a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    pub period: Duration,
}

struct ScheduledTask {
    name: String,
    period: Duration,
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns timing only; jobs carry the behavior.
#[derive(Default)]
pub struct Scheduler {
    tasks: DashMap<TaskId, ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period` until cancelled. Must be called within a
    /// Tokio runtime.
    pub fn schedule_periodic<F, Fut>(&self, name: &str, period: Duration, job: F) -> TaskId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Tokio rejects a zero period.
        let period = period.clamp(Duration::from_millis(1), MAX_HORIZON);
        let id = TaskId::new();
        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(deadline(Instant::now(), period), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => job().await,
                }
            }
            tracing::debug!(task = %task_name, "Periodic task stopped");
        });

        tracing::debug!(task = %name, id = %id, period_ms = period.as_millis() as u64, "Periodic task scheduled");
        self.tasks.insert(
            id,
            ScheduledTask {
                name: name.to_string(),
                period,
                cancel,
                handle,
            },
        );
        id
    }

    /// Stop a task after its current run, if any. Returns `false` for an
    /// unknown id.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some((_, task)) => {
                let _ = task.cancel.send(());
                tracing::debug!(task = %task.name, id = %id, "Periodic task cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel a task and wait for it to stop.
    pub async fn cancel_and_wait(&self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some((_, task)) => {
                let _ = task.cancel.send(());
                let _ = task.handle.await;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn active(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<TaskInfo> = self
            .tasks
            .iter()
            .map(|entry| TaskInfo {
                id: *entry.key(),
                name: entry.name.clone(),
                period: entry.period,
            })
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every task and wait for running jobs to finish.
    pub async fn shutdown(&self) {
        let ids: Vec<TaskId> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.cancel_and_wait(id).await;
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.active())
            .finish()
    }
}
