//! Sky API checkout service
//!
//! Single-binary Rust service that:
//! 1. Sends the organization user through the Sky API OAuth authorization-code flow
//! 2. Holds the resulting credential pair in memory
//! 3. Serves the checkout widget its public key and payment configurations
//! 4. Charges the transactions the widget authorizes

mod config;
mod diagnostics;
mod error;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;
use payments_api::{AuthenticatedClient, PaymentsApi};
use sky_auth::{Authenticator, ClientApplicationIdentity};

use crate::config::Config;
use crate::diagnostics::Diagnostics;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) auth: Arc<Authenticator>,
    pub(crate) payments: Arc<PaymentsApi>,
    pub(crate) diagnostics: Arc<Diagnostics>,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

impl AppState {
    /// Wire one credential store through the authenticator and the Payments
    /// API client so a refresh triggered by either is seen by both.
    fn new(
        http: reqwest::Client,
        identity: ClientApplicationIdentity,
        oauth_base_url: &str,
        api_base_url: &str,
        prometheus: PrometheusHandle,
    ) -> Self {
        let auth = Authenticator::new(http.clone(), Arc::new(identity), oauth_base_url);
        let client = AuthenticatedClient::new(http, api_base_url, auth.exchanger());
        Self {
            auth: Arc::new(auth),
            payments: Arc::new(PaymentsApi::new(client)),
            diagnostics: Arc::new(Diagnostics::new()),
            prometheus,
            started_at: Instant::now(),
        }
    }
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/login", get(routes::login_page))
        .route("/skyapi/login", get(routes::start_login))
        .route("/auth/callback", get(routes::auth_callback))
        .route("/skyapi/logout", get(routes::logout))
        .route("/skyapi/refresh", get(routes::refresh))
        .route("/checkout", get(routes::checkout))
        .route(
            "/paymentsapi/chargetransaction",
            post(routes::charge_transaction),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting sky-checkout");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let identity = config.sky_api.identity();
    info!(
        listen_addr = %config.server.listen_addr,
        oauth_base_url = %config.sky_api.oauth_base_url,
        api_base_url = %config.sky_api.api_base_url,
        application_id = %identity.application_id,
        "configuration loaded"
    );
    let missing = diagnostics::configuration_errors(&identity);
    if !missing.is_empty() {
        warn!(
            problems = missing.len(),
            "application registration incomplete, see the home page"
        );
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let app_state = AppState::new(
        http,
        identity,
        &config.sky_api.oauth_base_url,
        &config.sky_api.api_base_url,
        prometheus_handle,
    );

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race the drain
    // against the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Tags each request with an id span and records per-route metrics.
async fn track_requests(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().clone();
    let started = Instant::now();

    let span = tracing::info_span!("request", %request_id, %method, route = %route);
    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    metrics::record_request(&route, status, elapsed.as_secs_f64());
    span.in_scope(|| {
        debug!(status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
    });
    response
}

/// Liveness plus whether a credential pair is currently held.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "authenticated": state.auth.is_authenticated().await,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    axum::Json(body)
}

/// Prometheus metrics endpoint: text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
