//! The registered Sky API application this process acts as

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use sha2::{Digest, Sha256};

use crate::credentials::Fingerprint;

/// Application registration supplied by configuration at startup.
///
/// Immutable for the lifetime of the process; shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ClientApplicationIdentity {
    pub application_id: String,
    pub application_secret: Secret<String>,
    pub callback_uri: String,
    pub subscription_key: Secret<String>,
}

impl ClientApplicationIdentity {
    pub fn new(
        application_id: impl Into<String>,
        application_secret: impl Into<Secret<String>>,
        callback_uri: impl Into<String>,
        subscription_key: impl Into<Secret<String>>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            application_secret: application_secret.into(),
            callback_uri: callback_uri.into(),
            subscription_key: subscription_key.into(),
        }
    }

    /// `Authorization` header value for the token endpoint:
    /// `Basic base64(application_id:application_secret)`.
    pub fn basic_authorization(&self) -> String {
        let pair = format!(
            "{}:{}",
            self.application_id,
            self.application_secret.expose()
        );
        format!("Basic {}", STANDARD.encode(pair))
    }

    /// Fingerprint of the fields the authorization endpoint validates.
    ///
    /// Diagnostic results about the registration are cached under this key.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.application_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.callback_uri.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint::from_digest(bytes)
    }
}
