#![allow(dead_code)] // Test helpers appear unused when compiled independently

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use azcontainer::arm::ArmClient;
use azcontainer::auth::{AccessToken, TokenCredential};
use azcontainer::lro::PollConfig;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

pub const TEST_TOKEN: &str = "test-token";
pub const SUBSCRIPTION: &str = "sub-1";

/// One canned response.
#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// A request as the mock saw it.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Scripted management endpoint.
///
/// Replies registered for a route are served in order; the last one repeats.
/// Unregistered routes answer with an ARM-style 404.
pub struct MockArm {
    pub base_url: String,
    state: MockState,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockArm {
    pub async fn on(&self, method: &str, path: &str, reply: Reply) {
        self.state
            .routes
            .lock()
            .await
            .entry(route_key(method, path))
            .or_default()
            .push_back(reply);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().await.clone()
    }

    /// Recorded requests whose path is exactly `path`.
    pub async fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), path)
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

pub async fn spawn_mock_arm() -> MockArm {
    let state = MockState::default();
    let app = Router::new().fallback(respond).with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock management listener");
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock management server error: {}", err);
        }
    });

    MockArm {
        base_url: format!("http://127.0.0.1:{}", port),
        state,
        shutdown_tx,
        handle,
    }
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().await.push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    });

    let reply = {
        let mut routes = state.routes.lock().await;
        routes
            .get_mut(&route_key(method.as_str(), uri.path()))
            .and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
    };

    let Some(reply) = reply else {
        let body = json!({
            "error": {
                "code": "ResourceNotFound",
                "message": format!("{} was not found", uri.path())
            }
        });
        return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
    };

    let mut response = match reply.body {
        Some(body) => (reply.status, axum::Json(body)).into_response(),
        None => reply.status.into_response(),
    };
    for (name, value) in reply.headers {
        response.headers_mut().insert(
            HeaderName::try_from(name.as_str()).unwrap(),
            HeaderValue::try_from(value.as_str()).unwrap(),
        );
    }
    response
}

/// Credential handing out a fixed bearer token.
pub struct StaticCredential;

#[async_trait]
impl TokenCredential for StaticCredential {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_token(&self, _scope: &str) -> azcontainer::Result<AccessToken> {
        Ok(AccessToken::new(
            TEST_TOKEN,
            chrono::Utc::now() + chrono::Duration::hours(1),
        ))
    }
}

pub fn arm_client(mock: &MockArm) -> ArmClient {
    ArmClient::with_endpoint(Arc::new(StaticCredential), &mock.base_url).unwrap()
}

/// Poll quickly so tests stay fast.
pub fn fast_polling() -> PollConfig {
    PollConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        ..PollConfig::default()
    }
}

pub fn resource_path(group: &str, provider: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
        SUBSCRIPTION, group, provider, name
    )
}
