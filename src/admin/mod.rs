//! Authenticated HTTP API over the monitor's caller-facing operations.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::monitor::PresenceMonitor;

#[derive(Clone)]
pub struct AdminState {
    pub monitor: Arc<PresenceMonitor>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(monitor: Arc<PresenceMonitor>, api_key: &str) -> Self {
        Self {
            monitor,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/status/{name}", get(get_status))
        .route("/api/subscriptions/{group}", get(get_subscriptions))
        .route(
            "/api/subscriptions/{group}/{name}",
            put(add_subscription).delete(remove_subscription),
        )
        .route("/api/stats", get(get_stats))
        .route("/api/stats/reset", post(reset_stats))
        .route(
            "/api/health/{name}",
            get(get_member_health).delete(reset_member),
        )
        .route("/api/sync/{group}", post(sync_group))
        .route("/api/monitoring", get(get_monitoring).put(set_monitoring))
        .route("/api/flush", post(flush))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
