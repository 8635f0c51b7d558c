//! Self-checks reported on the home and login pages
//!
//! The home page verifies the application registration: every configured
//! value is present, then the authorization endpoint accepts the
//! registration. The login page verifies the logged-in user can reach the
//! Payments API. Both remote checks are cached under a fingerprint of the
//! inputs they depend on, so reloading a page does not hit the Sky API again
//! until the registration or the credential pair changes.

use std::future::Future;

use payments_api::PaymentsApi;
use serde::Serialize;
use sky_auth::{
    AuthorizationOutcome, Authenticator, ClientApplicationIdentity, FailureHint, Fingerprint,
};
use tokio::sync::Mutex;
use tracing::debug;

/// One problem shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub error: String,
    pub description: String,
}

impl ErrorView {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            description: description.into(),
        }
    }
}

/// Single-entry cache keyed by a fingerprint.
///
/// The lock is held while the value is computed, so concurrent page loads
/// wait for one remote check instead of each issuing their own.
pub struct DiagnosticCache<T> {
    entry: Mutex<Option<(Fingerprint, T)>>,
}

impl<T: Clone> DiagnosticCache<T> {
    pub fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    pub async fn get_or_compute<F, Fut>(&self, key: Fingerprint, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.get_or_compute_keyed(key, move || async move { (key, compute().await) })
            .await
    }

    /// Like `get_or_compute`, but the value is stored under the key the
    /// computation returns. For checks that can change their own input,
    /// such as a request that refreshes the credential pair.
    pub async fn get_or_compute_keyed<F, Fut>(&self, key: Fingerprint, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (Fingerprint, T)>,
    {
        let mut entry = self.entry.lock().await;
        if let Some((cached_key, value)) = entry.as_ref()
            && *cached_key == key
        {
            debug!(fingerprint = %key, "diagnostic cache hit");
            return value.clone();
        }

        let (stored_key, value) = compute().await;
        *entry = Some((stored_key, value.clone()));
        value
    }
}

impl<T: Clone> Default for DiagnosticCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Presence checks on the configured registration, in display order.
pub fn configuration_errors(identity: &ClientApplicationIdentity) -> Vec<ErrorView> {
    let mut errors = Vec::new();
    if identity.subscription_key.is_empty() {
        errors.push(ErrorView::new(
            "Subscription key not set",
            "Set SKY_SUBSCRIPTION_KEY or sky_api.subscription_key_file to the primary or \
             secondary key of your Sky API subscription.",
        ));
    }
    if identity.application_id.is_empty() {
        errors.push(ErrorView::new(
            "Application ID not set",
            "Set sky_api.application_id to the ID of the application registered in the \
             Sky API developer portal.",
        ));
    }
    if identity.application_secret.is_empty() {
        errors.push(ErrorView::new(
            "Application secret not set",
            "Set SKY_APPLICATION_SECRET or sky_api.application_secret_file to the \
             application's secret.",
        ));
    }
    if identity.callback_uri.is_empty() {
        errors.push(ErrorView::new(
            "Callback URI not set",
            "Set sky_api.callback_uri to a redirect URI registered for the application.",
        ));
    }
    errors
}

/// Translate a probe outcome into at most one operator-facing problem.
pub fn authorization_error(outcome: AuthorizationOutcome) -> Option<ErrorView> {
    if outcome.success {
        return None;
    }
    let view = match outcome.failure_hint.unwrap_or(FailureHint::Unknown) {
        FailureHint::InvalidClientId => ErrorView::new(
            "Invalid application ID",
            "The authorization endpoint does not recognize sky_api.application_id.",
        ),
        FailureHint::InvalidRedirectUri => ErrorView::new(
            "Invalid callback URI",
            "sky_api.callback_uri is not one of the redirect URIs registered for the \
             application.",
        ),
        FailureHint::Unknown => ErrorView::new(
            "Authorization request failed",
            "The authorization endpoint rejected the application registration. Check the \
             application ID and callback URI.",
        ),
    };
    Some(view)
}

/// Caches for the remote self-checks.
#[derive(Default)]
pub struct Diagnostics {
    authorization: DiagnosticCache<AuthorizationOutcome>,
    payments: DiagnosticCache<Option<ErrorView>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Home page problems. The authorization endpoint is only probed once
    /// every configured value is present.
    pub async fn home_errors(&self, auth: &Authenticator) -> Vec<ErrorView> {
        let identity = auth.identity();
        let errors = configuration_errors(identity);
        if !errors.is_empty() {
            return errors;
        }

        let outcome = self
            .authorization
            .get_or_compute(identity.fingerprint(), move || auth.probe_authorization())
            .await;
        authorization_error(outcome).into_iter().collect()
    }

    /// Login page problems for the current user. Nothing is checked while
    /// logged out.
    pub async fn login_errors(&self, auth: &Authenticator, payments: &PaymentsApi) -> Vec<ErrorView> {
        if !auth.is_authenticated().await {
            return Vec::new();
        }

        // The check may refresh the pair; cache under the one it ended with.
        let key = auth.fingerprint().await;
        self.payments
            .get_or_compute_keyed(key, move || async move {
                let view = match payments.public_key().await {
                    Ok(_) => None,
                    Err(e) => Some(ErrorView::new(
                        "Payments API request failed",
                        e.provider_message()
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string()),
                    )),
                };
                (auth.fingerprint().await, view)
            })
            .await
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_auth::Credential;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity(id: &str, secret: &str, callback: &str, key: &str) -> ClientApplicationIdentity {
        ClientApplicationIdentity::new(id, secret, callback, key)
    }

    #[test]
    fn configuration_errors_list_every_missing_value() {
        let errors = configuration_errors(&identity("", "", "", ""));
        let titles: Vec<&str> = errors.iter().map(|e| e.error.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Subscription key not set",
                "Application ID not set",
                "Application secret not set",
                "Callback URI not set",
            ]
        );
    }

    #[test]
    fn complete_configuration_has_no_errors() {
        let errors = configuration_errors(&identity(
            "app",
            "secret",
            "https://localhost:44300/auth/callback",
            "key",
        ));
        assert!(errors.is_empty(), "got: {errors:?}");
    }

    #[test]
    fn authorization_error_maps_hints() {
        assert_eq!(authorization_error(AuthorizationOutcome::ok()), None);
        assert_eq!(
            authorization_error(AuthorizationOutcome::failed(FailureHint::InvalidClientId))
                .unwrap()
                .error,
            "Invalid application ID"
        );
        assert_eq!(
            authorization_error(AuthorizationOutcome::failed(FailureHint::InvalidRedirectUri))
                .unwrap()
                .error,
            "Invalid callback URI"
        );
        assert_eq!(
            authorization_error(AuthorizationOutcome::failed(FailureHint::Unknown))
                .unwrap()
                .error,
            "Authorization request failed"
        );
    }

    #[tokio::test]
    async fn cache_recomputes_only_when_fingerprint_changes() {
        let cache: DiagnosticCache<usize> = DiagnosticCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 };

        let first = Credential::new("access-1", "refresh-1").unwrap().fingerprint();
        let second = Credential::new("access-2", "refresh-2").unwrap().fingerprint();

        assert_eq!(cache.get_or_compute(first, compute).await, 1);
        assert_eq!(cache.get_or_compute(first, compute).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.get_or_compute(second, compute).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Only the latest key is kept.
        assert_eq!(cache.get_or_compute(first, compute).await, 3);
    }

    #[tokio::test]
    async fn keyed_cache_stores_under_returned_key() {
        let cache: DiagnosticCache<&str> = DiagnosticCache::new();
        let stale = Credential::new("access-1", "refresh-1").unwrap().fingerprint();
        let fresh = Credential::new("access-2", "refresh-2").unwrap().fingerprint();

        let value = cache
            .get_or_compute_keyed(stale, || async move { (fresh, "checked") })
            .await;
        assert_eq!(value, "checked");

        let hit = cache
            .get_or_compute_keyed(fresh, || async move { (fresh, "recomputed") })
            .await;
        assert_eq!(hit, "checked");
    }
}
