//! Service-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Default text shown when a failed charge carries no provider message.
pub const CHARGE_FAILED_MESSAGE: &str = "The attempt to charge the checkout transaction failed.";

/// Errors surfaced by the JSON endpoints.
///
/// Page routes never fail outright; they report problems through their
/// `errors` list. Only the transaction endpoint turns an error into a
/// non-2xx response.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Payments(#[from] payments_api::Error),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Message rendered to the browser: the provider's own text when it sent
    /// one, otherwise a generic line.
    pub fn user_message(&self) -> String {
        match self {
            Error::Payments(e) => e
                .provider_message()
                .unwrap_or(CHARGE_FAILED_MESSAGE)
                .to_string(),
            Error::BadRequest(msg) => msg.clone(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Payments(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.user_message() });
        (self.status(), axum::Json(body)).into_response()
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
