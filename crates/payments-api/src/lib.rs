//! Sky Payments API client
//!
//! Issues bearer-authenticated requests against the Payments API using the
//! credential pair held by `sky_auth::CredentialStore`. A 401 triggers one
//! token refresh and one retry of the same request; whatever comes back from
//! the retry is final.
//!
//! `AuthenticatedClient` is the raw pipeline (any method, any path).
//! `PaymentsApi` layers the checkout operations and their wire models on top.

pub mod client;
pub mod constants;
pub mod error;
pub mod models;
pub mod payments;

#[cfg(test)]
mod testing;

pub use client::{ApiCallResult, AuthenticatedClient, OutboundRequest};
pub use constants::*;
pub use error::{Error, Result};
pub use models::{Amount, ConfigurationSelection, PaymentConfiguration, select_configurations};
pub use payments::PaymentsApi;
