//! Authorization redirect and endpoint self-check
//!
//! The authorization endpoint renders an HTML consent page. When the
//! application registration is wrong (unknown client id, unregistered
//! callback) the page embeds a developer-facing message inside an element
//! carrying [`ERROR_DETAILS_MARKER`]. [`classify_authorization_error`] is the
//! only code that knows about that markup.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::{AUTHORIZATION_PATH, ERROR_DETAILS_LEN, ERROR_DETAILS_MARKER, join_url};
use crate::identity::ClientApplicationIdentity;

/// Why the authorization endpoint refused the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHint {
    InvalidClientId,
    InvalidRedirectUri,
    Unknown,
}

/// Result of probing the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationOutcome {
    pub success: bool,
    /// Set only when `success` is false.
    pub failure_hint: Option<FailureHint>,
}

impl AuthorizationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            failure_hint: None,
        }
    }

    pub fn failed(hint: FailureHint) -> Self {
        Self {
            success: false,
            failure_hint: Some(hint),
        }
    }
}

/// Builds the user-facing authorization URL and checks that the endpoint
/// accepts this application's registration.
pub struct AuthorizationRedirector {
    http: reqwest::Client,
    identity: Arc<ClientApplicationIdentity>,
    authorize_url: String,
}

impl AuthorizationRedirector {
    pub fn new(
        http: reqwest::Client,
        identity: Arc<ClientApplicationIdentity>,
        oauth_base_url: &str,
    ) -> Self {
        Self {
            http,
            identity,
            authorize_url: join_url(oauth_base_url, AUTHORIZATION_PATH),
        }
    }

    /// `{authorize_url}?client_id=..&response_type=code&redirect_uri=..`
    ///
    /// Parameter values are inserted verbatim.
    pub fn build_authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}",
            self.authorize_url, self.identity.application_id, self.identity.callback_uri,
        )
    }

    /// GET the authorization URL and classify any failure.
    ///
    /// Diagnostic only. Transport errors and unrecognized error pages both
    /// come back as `FailureHint::Unknown`.
    pub async fn probe_authorization_endpoint(&self) -> AuthorizationOutcome {
        let url = self.build_authorization_url();
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "authorization endpoint unreachable");
                return AuthorizationOutcome::failed(FailureHint::Unknown);
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("authorization endpoint accepted application registration");
            return AuthorizationOutcome::ok();
        }

        let body = response.text().await.unwrap_or_default();
        let hint = classify_authorization_error(&body);
        warn!(status = status.as_u16(), ?hint, "authorization endpoint rejected application");
        AuthorizationOutcome::failed(hint)
    }
}

/// Classify an authorization error page.
///
/// Reads up to `ERROR_DETAILS_LEN` characters following the `>` that closes
/// the marker element's opening tag, lower-cases and trims them, then matches
/// known prefixes.
pub fn classify_authorization_error(body: &str) -> FailureHint {
    let Some(marker) = body.find(ERROR_DETAILS_MARKER) else {
        return FailureHint::Unknown;
    };
    let Some(tag_end) = body[marker..].find('>') else {
        return FailureHint::Unknown;
    };

    let details: String = body[marker + tag_end + 1..]
        .chars()
        .take(ERROR_DETAILS_LEN)
        .collect();
    let details = details.to_lowercase();
    let details = details.trim();

    if details.starts_with("invalid client_id") {
        FailureHint::InvalidClientId
    } else if details.starts_with("invalid redirect_uri") {
        FailureHint::InvalidRedirectUri
    } else {
        FailureHint::Unknown
    }
}
