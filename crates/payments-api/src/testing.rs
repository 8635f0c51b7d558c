//! Mock Sky API (token endpoint + resource API) for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::routing::post;
use sky_auth::{ClientApplicationIdentity, Credential, CredentialStore, TokenExchanger};
use tokio::net::TcpListener;

use crate::client::AuthenticatedClient;
use crate::constants::SUBSCRIPTION_KEY_HEADER;

/// A resource API request as seen by the mock.
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub subscription_key: Option<String>,
    pub body: String,
}

#[derive(Default)]
pub(crate) struct MockSkyApi {
    /// Bearer token the resource API accepts; anything else gets 401.
    valid_token: Mutex<String>,
    resource_hits: AtomicUsize,
    token_hits: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
    token_responses: Mutex<VecDeque<(StatusCode, String)>>,
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    token_delay: Duration,
}

impl MockSkyApi {
    pub fn accepting(token: &str) -> Self {
        let mock = Self::default();
        *mock.valid_token.lock().unwrap() = token.to_string();
        mock
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Queue a successful token endpoint response.
    pub fn issue_tokens(self, access: &str, refresh: &str) -> Self {
        let body = serde_json::json!({ "access_token": access, "refresh_token": refresh })
            .to_string();
        self.token_responses
            .lock()
            .unwrap()
            .push_back((StatusCode::OK, body));
        self
    }

    /// Response for an authorized request to `path` (default: 200 `{}`).
    pub fn route(self, path: &str, status: StatusCode, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn resource_hits(&self) -> usize {
        self.resource_hits.load(Ordering::SeqCst)
    }

    pub fn token_hits(&self) -> usize {
        self.token_hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn token_handler(
    State(mock): State<Arc<MockSkyApi>>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    mock.token_hits.fetch_add(1, Ordering::SeqCst);
    if !mock.token_delay.is_zero() {
        tokio::time::sleep(mock.token_delay).await;
    }
    let (status, body) = mock
        .token_responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#.into()));
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

async fn resource_handler(
    State(mock): State<Arc<MockSkyApi>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    mock.resource_hits.fetch_add(1, Ordering::SeqCst);
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let bearer = header_str(header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string));
    mock.seen.lock().unwrap().push(SeenRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        bearer: bearer.clone(),
        subscription_key: header_str(SUBSCRIPTION_KEY_HEADER),
        body,
    });

    let json = [(header::CONTENT_TYPE, "application/json")];
    let valid = mock.valid_token.lock().unwrap().clone();
    if bearer.as_deref() != Some(valid.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            json,
            r#"{"statusCode":401,"message":"Access denied due to invalid subscription key or token."}"#
                .into(),
        );
    }

    let (status, body) = mock
        .routes
        .lock()
        .unwrap()
        .get(uri.path())
        .cloned()
        .unwrap_or((StatusCode::OK, "{}".into()));
    (status, json, body)
}

/// Serve the mock on an ephemeral port; returns the base URL used for both
/// the identity provider and the resource API.
pub(crate) async fn spawn(mock: Arc<MockSkyApi>) -> String {
    let app = Router::new()
        .route("/token", post(token_handler))
        .fallback(resource_handler)
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client wired to `base`, with the store pre-populated by `initial` (if any).
pub(crate) async fn client(
    base: &str,
    initial: Option<(&str, &str)>,
) -> (AuthenticatedClient, Arc<CredentialStore>) {
    let identity = Arc::new(ClientApplicationIdentity::new(
        "app-id",
        "app-secret",
        "https://localhost:44300/auth/callback",
        "sub-key",
    ));
    let store = Arc::new(CredentialStore::new());
    if let Some((access, refresh)) = initial {
        store.set(Credential::new(access, refresh).unwrap()).await;
    }
    let http = reqwest::Client::new();
    let exchanger = Arc::new(TokenExchanger::new(
        http.clone(),
        identity,
        base,
        store.clone(),
    ));
    (AuthenticatedClient::new(http, base, exchanger), store)
}
