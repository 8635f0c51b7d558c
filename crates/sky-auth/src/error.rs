//! Error types for OAuth authentication operations

/// Errors from token endpoint interactions.
///
/// Every variant leaves the credential store exactly as it was before the
/// failing call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: connection refused, timeout, unreadable body.
    #[error("HTTP request failed: {0}")]
    Network(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    ProviderRejected { status: u16, body: String },

    /// 2xx response whose body lacks a usable token pair.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// Refresh requested while the store holds no refresh token.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
