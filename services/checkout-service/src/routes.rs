//! Page and API handlers
//!
//! Pages render JSON views. Problems are reported in each view's `errors`
//! list rather than as HTTP failures, so a misconfigured deployment still
//! renders something the operator can act on.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use payments_api::{Amount, ConfigurationSelection, PaymentConfiguration, select_configurations};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;
use crate::diagnostics::ErrorView;
use crate::error::{Error, Result};

/// Where every auth action lands afterwards.
pub const LOGIN_PAGE: &str = "/login";

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub errors: Vec<ErrorView>,
}

pub async fn home(State(state): State<AppState>) -> Json<HomeView> {
    let errors = state.diagnostics.home_errors(&state.auth).await;
    Json(HomeView { errors })
}

/// Never carries tokens, only whether a pair is held.
#[derive(Debug, Serialize)]
pub struct LoginView {
    pub logged_in: bool,
    pub errors: Vec<ErrorView>,
}

pub async fn login_page(State(state): State<AppState>) -> Json<LoginView> {
    let errors = state
        .diagnostics
        .login_errors(&state.auth, &state.payments)
        .await;
    Json(LoginView {
        logged_in: state.auth.is_authenticated().await,
        errors,
    })
}

pub async fn start_login(State(state): State<AppState>) -> Response {
    found(&state.auth.authorization_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Redirect target of the authorization endpoint. A failed exchange leaves
/// the user logged out; the login page shows that state.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match params.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            if let Err(e) = state.auth.login(code).await {
                warn!(error = %e, "authorization code exchange failed");
            }
        }
        _ => {
            warn!(
                error = params.error.as_deref().unwrap_or("missing code"),
                "authorization callback without a code"
            );
        }
    }
    found(LOGIN_PAGE)
}

pub async fn logout(State(state): State<AppState>) -> Response {
    state.auth.logout().await;
    found(LOGIN_PAGE)
}

pub async fn refresh(State(state): State<AppState>) -> Response {
    match state.auth.refresh().await {
        Ok(()) => info!("credential pair refreshed on request"),
        Err(e) => warn!(error = %e, "token refresh failed"),
    }
    found(LOGIN_PAGE)
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub public_key: Option<String>,
    pub payment_configurations: Vec<PaymentConfiguration>,
    pub errors: Vec<ErrorView>,
}

/// Everything the browser checkout widget needs to start.
pub async fn checkout(State(state): State<AppState>) -> Json<CheckoutView> {
    let mut view = CheckoutView {
        public_key: None,
        payment_configurations: Vec::new(),
        errors: Vec::new(),
    };

    if !state.auth.is_authenticated().await {
        view.errors.push(ErrorView::new(
            "Organization user not logged in",
            "Log in through /skyapi/login before starting a checkout.",
        ));
        return Json(view);
    }

    let (public_key, configurations) = tokio::join!(
        state.payments.public_key(),
        state.payments.payment_configurations()
    );

    match public_key {
        Ok(key) => view.public_key = Some(key),
        Err(e) => {
            warn!(error = %e, "public key request failed");
            view.errors.push(request_error("Public key request failed", &e));
        }
    }

    match configurations.map(select_configurations) {
        Ok(ConfigurationSelection::Usable(usable)) => view.payment_configurations = usable,
        Ok(ConfigurationSelection::NoneReturned) => view.errors.push(ErrorView::new(
            "No payment configurations found",
            "Create a payment configuration for the organization before starting a checkout.",
        )),
        Ok(ConfigurationSelection::AllLive) => view.errors.push(ErrorView::new(
            "No usable payment configurations",
            "Every payment configuration uses the 'Live' process mode, which this service \
             never charges against.",
        )),
        Err(e) => {
            warn!(error = %e, "payment configurations request failed");
            view.errors
                .push(request_error("Payment configurations request failed", &e));
        }
    }

    Json(view)
}

fn request_error(title: &str, error: &payments_api::Error) -> ErrorView {
    let description = error
        .provider_message()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    ErrorView::new(title, description)
}

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub amount: Amount,
    pub token: String,
}

/// Finalize a transaction the checkout widget authorized.
pub async fn charge_transaction(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChargeRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(request) = payload.map_err(|e| Error::BadRequest(e.body_text()))?;

    state
        .payments
        .charge_checkout_transaction(request.amount, &request.token)
        .await
        .inspect_err(|e| warn!(error = %e, amount = %request.amount, "checkout transaction failed"))?;

    Ok(StatusCode::NO_CONTENT)
}
