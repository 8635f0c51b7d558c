//! Facade handed to the presentation layer
//!
//! Wires one credential store to its token exchanger and authorization
//! redirector, and exposes the operations the web routes call: login,
//! logout, refresh and the authentication check.

use std::sync::Arc;

use tracing::info;

use crate::authorize::{AuthorizationOutcome, AuthorizationRedirector};
use crate::credentials::{Credential, CredentialStore, Fingerprint};
use crate::error::Result;
use crate::identity::ClientApplicationIdentity;
use crate::token::TokenExchanger;

pub struct Authenticator {
    store: Arc<CredentialStore>,
    exchanger: Arc<TokenExchanger>,
    redirector: AuthorizationRedirector,
}

impl Authenticator {
    /// Build the credential pipeline around a fresh, empty store.
    pub fn new(
        http: reqwest::Client,
        identity: Arc<ClientApplicationIdentity>,
        oauth_base_url: &str,
    ) -> Self {
        let store = Arc::new(CredentialStore::new());
        let exchanger = Arc::new(TokenExchanger::new(
            http.clone(),
            identity.clone(),
            oauth_base_url,
            store.clone(),
        ));
        let redirector = AuthorizationRedirector::new(http, identity, oauth_base_url);
        Self {
            store,
            exchanger,
            redirector,
        }
    }

    /// Complete the authorization-code flow.
    pub async fn login(&self, code: &str) -> Result<()> {
        self.exchanger.exchange_authorization_code(code).await
    }

    /// Forget the current pair. Safe to call when already logged out.
    pub async fn logout(&self) {
        self.store.clear().await;
        info!("logged out");
    }

    /// Refresh the pair on demand.
    pub async fn refresh(&self) -> Result<()> {
        self.exchanger.refresh_tokens().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store.is_authenticated().await
    }

    pub async fn credentials(&self) -> Credential {
        self.store.get().await
    }

    pub async fn fingerprint(&self) -> Fingerprint {
        self.store.fingerprint().await
    }

    pub fn authorization_url(&self) -> String {
        self.redirector.build_authorization_url()
    }

    pub async fn probe_authorization(&self) -> AuthorizationOutcome {
        self.redirector.probe_authorization_endpoint().await
    }

    pub fn identity(&self) -> &Arc<ClientApplicationIdentity> {
        self.exchanger.identity()
    }

    /// Exchanger shared with the Payments API client for 401 handling.
    pub fn exchanger(&self) -> Arc<TokenExchanger> {
        self.exchanger.clone()
    }
}
