//! Mock identity provider used by the unit tests in this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use tokio::net::TcpListener;

use crate::identity::ClientApplicationIdentity;

/// One request as seen by the mock token endpoint.
#[derive(Debug, Clone)]
pub(crate) struct TokenRequest {
    pub authorization: Option<String>,
    pub form: HashMap<String, String>,
}

/// Token endpoint that replays queued responses in order.
///
/// Once the queue is drained every request gets `400 invalid_grant`.
#[derive(Default)]
pub(crate) struct MockTokenEndpoint {
    hits: AtomicUsize,
    requests: Mutex<Vec<TokenRequest>>,
    responses: Mutex<VecDeque<(StatusCode, String)>>,
    delay: Duration,
}

impl MockTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn respond(self, status: StatusCode, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
        self
    }

    pub fn respond_tokens(self, access: &str, refresh: &str) -> Self {
        let body = serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 3600,
            "token_type": "bearer",
        })
        .to_string();
        self.respond(StatusCode::OK, &body)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn token_handler(
    State(mock): State<Arc<MockTokenEndpoint>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    mock.requests.lock().unwrap().push(TokenRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        form,
    });
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    let (status, body) = mock
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#.into()));
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Serve `mock` at `/token` on an ephemeral port and return the base URL.
pub(crate) async fn spawn_token_endpoint(mock: Arc<MockTokenEndpoint>) -> String {
    let app = Router::new()
        .route("/token", post(token_handler))
        .with_state(mock);
    spawn(app).await
}

/// Serve an arbitrary router on an ephemeral port and return the base URL.
pub(crate) async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn identity() -> Arc<ClientApplicationIdentity> {
    Arc::new(ClientApplicationIdentity::new(
        "app-id",
        "app-secret",
        "https://localhost:44300/auth/callback",
        "sub-key",
    ))
}
