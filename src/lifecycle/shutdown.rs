//! Shutdown coordination for the monitor.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks (admin API, persister, config watcher) subscribe and
/// stop when the signal fires.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Returns how many subscribers were listening.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Subscribers that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
