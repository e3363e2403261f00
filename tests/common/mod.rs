//! Shared test infrastructure: a mock site, a recording listener and DSF
//! frame builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use feasibility_core::broker::{BrokerClient, QueryStatusListener, QueryStatusUpdate};
use feasibility_core::config::DirectBrokerConfig;
use feasibility_core::BrokerType;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A request the mock site received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct MockSiteState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// HTTP site answering every query with a fixed status and body
pub struct MockSite {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

async fn execute_query(
    State(state): State<MockSiteState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.requests.lock().push(RecordedRequest {
        method: "POST".to_string(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    (state.status, state.body.clone())
}

impl MockSite {
    pub async fn start(status: u16, body: &str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockSiteState {
            status: StatusCode::from_u16(status).expect("valid status code"),
            body: body.to_string(),
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/query/execute", post(execute_query))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock site");
        let addr = listener.local_addr().expect("mock site address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock site failed");
        });

        Self {
            base_url: format!("http://{addr}/"),
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn broker_config(&self) -> DirectBrokerConfig {
        DirectBrokerConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 5_000,
            ..DirectBrokerConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Listener forwarding every update it sees into a channel
pub struct RecordingListener {
    sender: mpsc::UnboundedSender<(BrokerType, QueryStatusUpdate)>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(BrokerType, QueryStatusUpdate)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl QueryStatusListener for RecordingListener {
    async fn on_client_update(&self, client: &dyn BrokerClient, update: &QueryStatusUpdate) {
        let _ = self.sender.send((client.broker_type(), update.clone()));
    }
}

/// Next recorded update, failing the test after a generous timeout
pub async fn next_update(
    receiver: &mut mpsc::UnboundedReceiver<(BrokerType, QueryStatusUpdate)>,
) -> (BrokerType, QueryStatusUpdate) {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for status update")
        .expect("listener channel closed")
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within timeout"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Completed DSF task carrying a measure count for a query at a site
pub fn completed_task(query_id: &str, site_id: &str, count: i64) -> String {
    json!({
        "resourceType": "Task",
        "status": "completed",
        "requester": { "identifier": { "value": site_id } },
        "input": [{
            "type": { "coding": [{ "code": "business-key" }] },
            "valueString": query_id
        }],
        "output": [{
            "type": { "coding": [{ "code": "measure-count" }] },
            "valueUnsignedInt": count
        }]
    })
    .to_string()
}
