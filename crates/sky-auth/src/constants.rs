//! Sky API OAuth endpoint constants
//!
//! Base URLs are configurable so tests and staging environments can point at
//! a different identity provider; the paths beneath them are fixed.

/// Default identity provider base URL
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://oauth2.sky.blackbaud.com";

/// Token endpoint path (code exchange and refresh)
pub const TOKEN_PATH: &str = "/token";

/// Authorization endpoint path (user-facing consent page)
pub const AUTHORIZATION_PATH: &str = "/authorization";

/// Element class the authorization page uses to render developer-facing errors.
pub const ERROR_DETAILS_MARKER: &str = "bbapi-error-developer-details-message";

/// Number of characters read after the marker element's opening tag.
pub const ERROR_DETAILS_LEN: usize = 50;

/// Join a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
