//! Sky API OAuth authentication library
//!
//! Owns the credential lifecycle for a single organization user: building the
//! authorization redirect, exchanging the returned authorization code for an
//! access/refresh token pair, refreshing that pair, and holding it in an
//! in-memory store that the Payments API client reads on every call.
//!
//! Credential flow:
//! 1. Presentation layer redirects the user to `AuthorizationRedirector::build_authorization_url()`
//! 2. Callback hands the code to `TokenExchanger::exchange_authorization_code()`
//! 3. `CredentialStore` holds the pair until logout or the next refresh
//! 4. A 401 from the resource API triggers `TokenExchanger::refresh_after_rejection()`

pub mod authenticator;
pub mod authorize;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod token;

#[cfg(test)]
mod testing;

pub use authenticator::Authenticator;
pub use authorize::{
    AuthorizationOutcome, AuthorizationRedirector, FailureHint, classify_authorization_error,
};
pub use constants::*;
pub use credentials::{Credential, CredentialStore, Fingerprint};
pub use error::{Error, Result};
pub use identity::ClientApplicationIdentity;
pub use token::{RefreshOutcome, TokenExchanger, TokenResponse};
