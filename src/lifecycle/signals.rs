//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT during shutdown forces exit (handled by the caller)
//! - SIGHUP triggers config reload, not shutdown

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Start listening for signals. Events arrive on the returned channel
/// until it is dropped.
pub fn listen() -> std::io::Result<mpsc::UnboundedReceiver<SignalEvent>> {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => SignalEvent::Shutdown,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to listen for SIGINT");
                            break;
                        }
                    },
                    Some(()) = terminate.recv() => SignalEvent::Shutdown,
                    Some(()) = hangup.recv() => SignalEvent::Reload,
                };
                tracing::info!(event = ?event, "Signal received");
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Signal received");
                if tx.send(SignalEvent::Shutdown).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}
