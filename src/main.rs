//! Presence monitor daemon.
//!
//! Tracks the online/offline status of many named entities for many
//! subscriber groups and notifies each group when a watched entity changes.
//!
//! # Architecture Overview
//!
//! ```text
//!   admin API / roster tick
//!            │
//!            ▼
//!   ┌──────────────────┐      ┌────────────────┐
//!   │ BatchQuery       │─────▶│ StatusProvider │
//!   │ Coordinator      │◀─────│ (HTTP, batch)  │
//!   └────────┬─────────┘      └────────────────┘
//!            │ per name
//!            ▼
//!   StatusCache + HealthTracker → waiters → ChangeDetector
//!                                                │
//!                                                ▼
//!   SubscriptionRegistry ──────────▶ NotificationDispatcher → Messenger
//!            │
//!            ▼
//!   SubscriptionPersister → SubscriptionStore
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use presence_monitor::admin::{self, AdminState};
use presence_monitor::config::{load_config, ConfigWatcher, MonitorConfig};
use presence_monitor::lifecycle::{signals, Shutdown, SignalEvent};
use presence_monitor::notify::messenger;
use presence_monitor::observability::{logging, metrics};
use presence_monitor::provider::{HttpStatusProvider, StatusProvider};
use presence_monitor::subscriptions::{
    InMemoryStore, JsonFileStore, SubscriptionRegistry, SubscriptionStore,
};
use presence_monitor::{MonitorError, PresenceMonitor};

/// Longest wait for batches in flight once shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "presence-monitor", version, about = "Batched presence monitoring daemon")]
struct Args {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn next_reload(
    updates: &mut Option<mpsc::UnboundedReceiver<MonitorConfig>>,
) -> Option<MonitorConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn reload(path: Option<&Path>) -> Option<MonitorConfig> {
    let path = path?;
    match load_config(path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MonitorConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "presence-monitor starting");
    tracing::info!(
        batch_size = config.batch.batch_size,
        max_wait_ms = config.batch.max_wait_ms,
        ttl_secs = config.cache.ttl_secs,
        failure_threshold = config.health.failure_threshold,
        provider = %config.provider.endpoint,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let provider: Arc<dyn StatusProvider> = Arc::new(HttpStatusProvider::new(&config.provider)?);
    let messenger = messenger::from_config(&config.notification)?;
    let store: Arc<dyn SubscriptionStore> = match &config.persistence.subscriptions_path {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(InMemoryStore::new()),
    };

    let registry = Arc::new(SubscriptionRegistry::with_subscriptions(store.load().await?));
    tracing::info!(
        groups = registry.group_count(),
        names = registry.name_count(),
        "Subscriptions loaded"
    );

    let shutdown = Shutdown::new();
    let persister = tokio::spawn(registry.persister(store).run(shutdown.subscribe()));

    let monitor = PresenceMonitor::new(config.clone(), provider, messenger, registry);
    monitor.prime();
    monitor.start();

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(Arc::clone(&monitor), &config.admin.api_key);
        Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let (_watcher, mut updates) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), Some(rx)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, reload with SIGHUP");
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    let mut signals = signals::listen()?;
    loop {
        tokio::select! {
            event = signals.recv() => match event {
                Some(SignalEvent::Reload) => {
                    if let Some(new_config) = reload(args.config.as_deref()) {
                        monitor.apply_config(new_config).await;
                    }
                }
                Some(SignalEvent::Shutdown) | None => break,
            },
            Some(new_config) = next_reload(&mut updates) => {
                monitor.apply_config(new_config).await;
            }
        }
    }

    tracing::info!("Shutting down");
    monitor.stop_ticks().await;
    shutdown.trigger();

    tokio::select! {
        idle = monitor.shutdown(SHUTDOWN_TIMEOUT) => {
            if !idle {
                tracing::warn!("Batches still in flight at shutdown deadline");
            }
        }
        Some(SignalEvent::Shutdown) = signals.recv() => {
            tracing::warn!("Second shutdown signal, exiting immediately");
            return Ok(());
        }
    }

    if let Some(admin) = admin {
        match admin.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }
    if let Err(e) = persister.await {
        tracing::error!(error = %e, "Subscription persister panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
