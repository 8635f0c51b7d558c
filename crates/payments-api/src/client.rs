//! Bearer-authenticated request pipeline with refresh-then-retry-once
//!
//! Every logical call runs at most two attempts:
//! 1. Send with the access token currently in the store.
//! 2. If that returned 401, refresh (coalesced with any concurrent refresh
//!    for the same stale pair) and send the *same* request once more,
//!    whether or not the refresh succeeded.
//!
//! A 401 from the second attempt is returned to the caller as-is. Transport
//! failures are `Err(Error::Network)` on either attempt.

use std::sync::Arc;

use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sky_auth::{Fingerprint, TokenExchanger};
use tracing::{debug, info, instrument, warn};

use crate::constants::SUBSCRIPTION_KEY_HEADER;
use crate::error::{Error, Result};
use crate::models::ErrorData;

/// A request relative to the resource API base URL.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Outcome of a downstream call, returned verbatim for the caller to
/// interpret.
#[derive(Debug, Clone)]
pub struct ApiCallResult {
    pub success: bool,
    pub status: u16,
    pub body: String,
}

impl ApiCallResult {
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }

    /// Decode a successful body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// The `message` field of an error payload, if the body is one.
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_str::<ErrorData>(&self.body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty())
    }
}

/// Issues resource API calls on behalf of the stored credential pair.
///
/// Reads the store on every attempt; never writes it except through the
/// token exchanger's refresh.
pub struct AuthenticatedClient {
    http: reqwest::Client,
    api_base_url: String,
    exchanger: Arc<TokenExchanger>,
}

impl AuthenticatedClient {
    pub fn new(http: reqwest::Client, api_base_url: &str, exchanger: Arc<TokenExchanger>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            exchanger,
        }
    }

    /// Run one logical call through the refresh-then-retry-once cycle.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn call(&self, request: &OutboundRequest) -> Result<ApiCallResult> {
        let (first, used) = self.attempt(request).await?;
        if !first.is_unauthorized() {
            return Ok(first);
        }

        metrics::counter!("payments_api_refresh_retries_total").increment(1);
        info!("resource API rejected access token, refreshing and retrying once");

        match self.exchanger.refresh_after_rejection(used).await {
            Ok(outcome) => debug!(?outcome, "refresh step finished"),
            Err(e) => warn!(error = %e, "token refresh failed, retrying with current credentials"),
        }

        let (retry, _) = self.attempt(request).await?;
        if retry.is_unauthorized() {
            warn!("resource API still rejects credentials after refresh");
        }
        Ok(retry)
    }

    /// Send once with the current access token. Returns the fingerprint of
    /// the pair that was used so a 401 can be matched to it.
    async fn attempt(&self, request: &OutboundRequest) -> Result<(ApiCallResult, Fingerprint)> {
        let credential = self.exchanger.store().get().await;
        let identity = self.exchanger.identity();
        let url = format!("{}{}", self.api_base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(credential.access_token())
            .header(SUBSCRIPTION_KEY_HEADER, identity.subscription_key.expose().as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                Error::InvalidRequest(e.to_string())
            } else {
                Error::Network(format!("{} {} failed: {e}", request.method, request.path))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("reading response body: {e}")))?;

        metrics::counter!("payments_api_requests_total", "status" => status.as_u16().to_string())
            .increment(1);
        debug!(status = status.as_u16(), "resource API responded");

        Ok((
            ApiCallResult {
                success: status.is_success(),
                status: status.as_u16(),
                body,
            },
            credential.fingerprint(),
        ))
    }
}
