//! Admin API over HTTP.

mod common;

use reqwest::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use common::{build_monitor, config, RecordingMessenger, ScriptedProvider};
use presence_monitor::admin::{self, AdminState};
use presence_monitor::status::Status;
use presence_monitor::{PresenceMonitor, Shutdown};

const KEY: &str = "test-admin-key";

struct Harness {
    base: String,
    client: reqwest::Client,
    monitor: Arc<PresenceMonitor>,
    shutdown: Shutdown,
}

impl Harness {
    async fn start(provider: &Arc<ScriptedProvider>) -> Self {
        let monitor = build_monitor(config(1), provider, &RecordingMessenger::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(admin::serve(
            listener,
            AdminState::new(monitor.clone(), KEY),
            shutdown.subscribe(),
        ));

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            monitor,
            shutdown,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(KEY)
    }
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let harness = Harness::start(&ScriptedProvider::new()).await;

    let res = harness
        .client
        .get(format!("{}/api/stats", harness.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = harness
        .client
        .get(format!("{}/api/stats", harness.base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = harness
        .request(reqwest::Method::GET, "/api/stats")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().starts_with("Presence monitor statistics"));
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_status_lookup() {
    let provider = ScriptedProvider::new();
    provider.set_status("alice", Status::Online);
    let harness = Harness::start(&provider).await;

    let res = harness
        .request(reqwest::Method::GET, "/api/status/alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "alice");
    assert_eq!(body["status"], "online");
    assert!(body["raw_payload"].as_str().unwrap().contains("alice"));

    let res = harness
        .request(reqwest::Method::GET, "/api/status/ghost")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ghost"));
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_subscription_lifecycle() {
    let provider = ScriptedProvider::new();
    provider.set_status("bob", Status::Offline);
    let harness = Harness::start(&provider).await;
    use reqwest::Method;

    let res = harness
        .request(Method::PUT, "/api/subscriptions/ops/bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "added");

    let res = harness
        .request(Method::PUT, "/api/subscriptions/ops/bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(common::eventually(|| harness.monitor.detector().previous("bob").is_some()).await);
    let summary = harness
        .request(Method::GET, "/api/subscriptions/ops")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(summary.contains("- bob: offline"));

    let health = harness
        .request(Method::GET, "/api/health/bob")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(health.contains("Watched by: ops"));

    let res = harness
        .request(Method::DELETE, "/api/subscriptions/ops/bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = harness
        .request(Method::DELETE, "/api/subscriptions/ops/bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_flush_and_reset() {
    let harness = Harness::start(&ScriptedProvider::new()).await;
    use reqwest::Method;

    let res = harness.request(Method::POST, "/api/flush").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["flushed"], 0);

    let res = harness
        .request(Method::POST, "/api/stats/reset")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.monitor.stats().batch.batches, 0);
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_monitoring_switch() {
    let harness = Harness::start(&ScriptedProvider::new()).await;
    use reqwest::Method;

    let body: serde_json::Value = harness
        .request(Method::GET, "/api/monitoring")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["enabled"], true);

    let res = harness
        .request(Method::PUT, "/api/monitoring")
        .json(&serde_json::json!({ "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["enabled"], false);
    assert_eq!(body["previous"], true);
    assert!(!harness.monitor.is_enabled());

    let res = harness
        .request(Method::PUT, "/api/monitoring")
        .json(&serde_json::json!({ "on": true }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());
    assert!(!harness.monitor.is_enabled());
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_sync_reports_live_status() {
    let provider = ScriptedProvider::new();
    provider.set_status("carol", Status::Online);
    let harness = Harness::start(&provider).await;
    use reqwest::Method;

    harness.monitor.add_subscription("ops", "carol").unwrap();
    assert!(common::eventually(|| harness.monitor.detector().previous("carol").is_some()).await);

    provider.set_status("carol", Status::Offline);
    let res = harness.request(Method::POST, "/api/sync/ops").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await.unwrap();
    assert!(text.contains("- carol: online -> offline, cached online"));
    assert!(text.ends_with("Synced 1 of 1, 1 changed"));
    assert_eq!(provider.times_queried("carol"), 2);
    harness.shutdown.trigger();
}

#[tokio::test]
async fn test_reset_member() {
    let provider = ScriptedProvider::new();
    provider.set_status("dave", Status::Online);
    let harness = Harness::start(&provider).await;
    use reqwest::Method;

    let res = harness.request(Method::DELETE, "/api/health/dave").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let _ = harness.monitor.request_status("dave").await;
    let res = harness.request(Method::DELETE, "/api/health/dave").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "dave");
    assert_eq!(body["cleared"], true);
    assert!(harness.monitor.cache().peek("dave").is_none());

    let res = harness.request(Method::DELETE, "/api/health/%20").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    harness.shutdown.trigger();
}
