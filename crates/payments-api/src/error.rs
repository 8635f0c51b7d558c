//! Error types for Payments API operations

/// Errors from Payments API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure. Never conflated with an HTTP 401.
    #[error("HTTP request failed: {0}")]
    Network(String),

    /// 401 that survived the refresh-and-retry cycle.
    #[error("authentication failed after token refresh: {body}")]
    AuthenticationFailure { body: String },

    /// Any other non-2xx response. `message` is the provider's embedded
    /// `{"message": ...}` text, or empty when there was none.
    #[error("Payments API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode Payments API response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Provider-supplied error text, if the response carried one.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Error::Api { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Result alias for Payments API operations.
pub type Result<T> = std::result::Result<T, Error>;
