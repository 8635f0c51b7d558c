//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completes the login redirect)
//! 2. Token refresh (after the resource API rejects an access token)
//!
//! Both POST a form body to `{oauth_base_url}/token` with HTTP Basic client
//! authentication. On success the whole credential pair in the store is
//! replaced; on any failure the store is left exactly as it was.
//!
//! All writes go through one async mutex. A caller that saw a 401 passes the
//! fingerprint of the pair it used; if another caller already refreshed while
//! it waited for the lock, no second request is sent.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{TOKEN_PATH, join_url};
use crate::credentials::{Credential, CredentialStore, Fingerprint};
use crate::error::{Error, Result};
use crate::identity::ClientApplicationIdentity;

/// Response from the token endpoint for both exchange and refresh.
///
/// Only the two tokens are required; Sky API also returns lifetime and
/// environment metadata which is ignored apart from logging.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires. Informational only, so a
    /// value that is not a non-negative integer reads as absent.
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_in: Option<u64>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// What `refresh_after_rejection` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call refreshed the pair.
    Refreshed,
    /// The pair had already changed by the time the lock was acquired.
    AlreadyRefreshed,
}

/// Performs token endpoint calls and writes the results into the store.
pub struct TokenExchanger {
    http: reqwest::Client,
    identity: Arc<ClientApplicationIdentity>,
    token_url: String,
    store: Arc<CredentialStore>,
    write_lock: Mutex<()>,
}

impl TokenExchanger {
    pub fn new(
        http: reqwest::Client,
        identity: Arc<ClientApplicationIdentity>,
        oauth_base_url: &str,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            http,
            identity,
            token_url: join_url(oauth_base_url, TOKEN_PATH),
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<ClientApplicationIdentity> {
        &self.identity
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// Never retried: a code is single-use, so a failure here means the user
    /// has to go through the authorization redirect again.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.identity.callback_uri.as_str()),
        ];
        let credential = self.request_tokens("authorization_code", &form).await?;
        self.store.set(credential).await;
        info!("authorization code exchanged for token pair");
        Ok(())
    }

    /// Refresh the pair unconditionally using the refresh token currently in
    /// the store.
    pub async fn refresh_tokens(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after the resource API rejected the pair identified by
    /// `rejected`.
    ///
    /// Concurrent callers that all saw the same stale pair collapse into one
    /// token endpoint request: the first refreshes, the rest find a different
    /// fingerprint once they get the lock and return `AlreadyRefreshed`.
    pub async fn refresh_after_rejection(&self, rejected: Fingerprint) -> Result<RefreshOutcome> {
        let _guard = self.write_lock.lock().await;

        let current = self.store.fingerprint().await;
        if current != rejected {
            debug!(%rejected, %current, "credential pair already replaced, skipping refresh");
            return Ok(RefreshOutcome::AlreadyRefreshed);
        }

        self.refresh_locked().await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Caller must hold `write_lock`.
    async fn refresh_locked(&self) -> Result<()> {
        // Read at call time so a pair rotated by an earlier refresh is used.
        let current = self.store.get().await;
        if current.refresh_token().is_empty() {
            return Err(Error::NotAuthenticated("no refresh token stored".into()));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token()),
        ];
        let credential = self.request_tokens("refresh_token", &form).await?;
        self.store.set(credential).await;
        info!("token refresh succeeded");
        Ok(())
    }

    async fn request_tokens(
        &self,
        grant_type: &'static str,
        form: &[(&str, &str)],
    ) -> Result<Credential> {
        let result = self.post_token_form(form).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(Error::Network(_)) => "network_error",
            Err(Error::ProviderRejected { .. }) => "rejected",
            Err(Error::MalformedResponse(_)) => "malformed",
            Err(Error::NotAuthenticated(_)) => "not_authenticated",
        };
        metrics::counter!(
            "sky_auth_token_requests_total",
            "grant_type" => grant_type,
            "outcome" => outcome
        )
        .increment(1);

        if let Err(e) = &result {
            warn!(grant_type, error = %e, "token request failed, credentials unchanged");
        }
        result
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<Credential> {
        let response = self
            .http
            .post(&self.token_url)
            .header(AUTHORIZATION, self.identity.basic_authorization())
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("reading token response: {e}")))?;

        if !status.is_success() {
            return Err(Error::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("invalid token response: {e}")))?;
        debug!(expires_in = ?tokens.expires_in, "token endpoint issued new pair");
        Credential::new(tokens.access_token, tokens.refresh_token)
    }
}
