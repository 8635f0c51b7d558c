//! In-memory credential storage for the Sky API token pair
//!
//! The store holds exactly one access/refresh pair for the organization user
//! who completed the authorization-code flow. Every mutation replaces the whole
//! pair under a single lock, so readers observe either the previous pair or the
//! next one, never a mix of the two.
//!
//! Nothing is persisted: a process restart means the user logs in again.

use std::fmt;

use common::Secret;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Access/refresh token pair.
///
/// Both tokens are empty (logged out) or both are non-empty (logged in). The
/// only constructors are [`Credential::empty`] and the validating
/// [`Credential::new`], so a half-populated pair cannot be built.
#[derive(Debug, Clone)]
pub struct Credential {
    access: Secret<String>,
    refresh: Secret<String>,
}

impl Credential {
    /// The logged-out pair.
    pub fn empty() -> Self {
        Self {
            access: Secret::empty(),
            refresh: Secret::empty(),
        }
    }

    /// Build an authenticated pair. Fails if either token is empty.
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Result<Self> {
        let access = access.into();
        let refresh = refresh.into();
        if access.is_empty() || refresh.is_empty() {
            return Err(Error::MalformedResponse(
                "access_token and refresh_token must both be non-empty".into(),
            ));
        }
        Ok(Self {
            access: Secret::new(access),
            refresh: Secret::new(refresh),
        })
    }

    pub fn access_token(&self) -> &str {
        self.access.expose()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh.expose()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.access.is_empty()
    }

    /// Stable digest of the pair, used to key cached results and to detect
    /// that a concurrent refresh already replaced the pair.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.access.expose().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.refresh.expose().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}

/// SHA-256 digest identifying a credential pair or application identity.
///
/// Displayed as a short hex prefix so it can go into log fields without
/// revealing anything usable.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub(crate) fn from_digest(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Process-wide holder of the current credential pair.
///
/// Written only by the token exchanger (and logout); read by the Payments API
/// client on every call and by diagnostics.
pub struct CredentialStore {
    state: RwLock<Credential>,
}

impl CredentialStore {
    /// Create an empty (logged out) store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Credential::empty()),
        }
    }

    /// Snapshot of the current pair.
    pub async fn get(&self) -> Credential {
        self.state.read().await.clone()
    }

    /// Replace the whole pair.
    pub async fn set(&self, credential: Credential) {
        let fingerprint = credential.fingerprint();
        *self.state.write().await = credential;
        debug!(%fingerprint, "stored credential pair");
    }

    /// Reset to the logged-out pair. Idempotent.
    pub async fn clear(&self) {
        *self.state.write().await = Credential::empty();
        debug!("cleared credential pair");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn fingerprint(&self) -> Fingerprint {
        self.state.read().await.fingerprint()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
