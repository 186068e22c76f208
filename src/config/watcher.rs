//! Hot reload of the configuration file.
//!
//! # Responsibilities
//! - Notice saves of the config file, including editors that write a
//!   temporary file and rename it over the original
//! - Collapse the burst of events one save produces into one reload
//! - Forward only configurations that load and validate
//!
//! # Design Decisions
//! - The parent directory is watched, so the watch survives the file being
//!   replaced; events for other files in it are ignored
//! - Reloading waits until the file has been quiet for [`SETTLE_DELAY`]

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::MonitorConfig;

/// Quiet period after the last event before the file is read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Watches one configuration file and emits each valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<MonitorConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver of validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<MonitorConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called within a Tokio runtime; the returned
    /// watcher must be kept alive for reloads to continue.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if concerns(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(self.path.clone(), event_rx, self.update_tx));
        tracing::info!(path = ?self.path, directory = ?directory, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` may have changed the file called `file_name`.
fn concerns(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    relevant_kind
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

/// Wait for a burst of events to end. Returns `false` once the event
/// source is gone.
async fn settle(events: &mut mpsc::UnboundedReceiver<()>, quiet: Duration) -> bool {
    if events.recv().await.is_none() {
        return false;
    }
    loop {
        match tokio::time::timeout(quiet, events.recv()).await {
            Ok(Some(())) => continue,
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}

async fn reload_loop(
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<MonitorConfig>,
) {
    while settle(&mut events, SETTLE_DELAY).await {
        tracing::info!(path = ?path, "Config file changed, reloading");
        match load_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
    tracing::debug!(path = ?path, "Config watcher stopped");
}
