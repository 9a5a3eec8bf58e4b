// src/test_utils/mock_execution_server.rs
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// A scripted answer to one `POST /execute`.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            delay: None,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
        }
    }

    /// Successful run whose combined output is `output`.
    pub fn output(output: &str) -> Self {
        Self::ok(json!({
            "run": { "stdout": output, "stderr": "", "output": output, "code": 0, "signal": null }
        }))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<Value>>>,
    runtimes: Arc<Mutex<Value>>,
}

async fn execute_handler(
    State(state): State<MockServerState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    log::debug!("Mock execution server received request: {}", payload);
    state.requests.lock().unwrap().push(payload);

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(reply) => {
            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            (status, Json(reply.body))
        }
        None => {
            log::error!("Mock execution server ran out of replies!");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "message": "no scripted reply" })),
            )
        }
    }
}

async fn runtimes_handler(State(state): State<MockServerState>) -> Json<Value> {
    Json(state.runtimes.lock().unwrap().clone())
}

pub struct MockExecutionServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<Mutex<Vec<Value>>>,
    runtimes: Arc<Mutex<Value>>,
}

impl MockExecutionServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            runtimes: Arc::new(Mutex::new(json!([]))),
        };
        let requests = state.requests.clone();
        let runtimes = state.runtimes.clone();

        let app = Router::new()
            .route("/execute", post(execute_handler))
            .route("/runtimes", get(runtimes_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock execution server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock execution server error: {}", e);
                });
        });

        MockExecutionServer {
            addr,
            shutdown_tx,
            requests,
            runtimes,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_runtimes(&self, runtimes: Value) {
        *self.runtimes.lock().unwrap() = runtimes;
    }

    pub fn get_requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock execution server shutdown signal already sent or receiver dropped.");
        }
    }
}
