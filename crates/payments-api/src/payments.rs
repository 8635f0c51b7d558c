//! Checkout operations on the Payments API
//!
//! Each operation is one logical call through `AuthenticatedClient`, so each
//! gets its own refresh-then-retry-once cycle and a retry always resends the
//! operation that failed.

use tracing::info;

use crate::client::{ApiCallResult, AuthenticatedClient, OutboundRequest};
use crate::constants::{CHECKOUT_TRANSACTION_PATH, PAYMENT_CONFIGURATIONS_PATH, PUBLIC_KEY_PATH};
use crate::error::{Error, Result};
use crate::models::{Amount, PaymentConfiguration, PaymentConfigurationList, PublicKeyData, TransactionBody};

pub struct PaymentsApi {
    client: AuthenticatedClient,
}

impl PaymentsApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    /// Raw pipeline, for callers that interpret responses themselves.
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Payment configurations visible to the logged-in organization user.
    pub async fn payment_configurations(&self) -> Result<Vec<PaymentConfiguration>> {
        let result = self
            .send(OutboundRequest::get(PAYMENT_CONFIGURATIONS_PATH))
            .await?;
        let list: PaymentConfigurationList = result.json()?;
        Ok(list.value)
    }

    /// Public key the browser checkout widget is initialized with.
    pub async fn public_key(&self) -> Result<String> {
        let result = self.send(OutboundRequest::get(PUBLIC_KEY_PATH)).await?;
        let data: PublicKeyData = result.json()?;
        Ok(data.public_key)
    }

    /// Finalize a checkout transaction the widget authorized.
    pub async fn charge_checkout_transaction(
        &self,
        amount: Amount,
        authorization_token: &str,
    ) -> Result<()> {
        if authorization_token.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "authorization token must not be empty".into(),
            ));
        }
        let body = TransactionBody {
            amount: amount.minor_units(),
            authorization_token,
        };
        let body = serde_json::to_value(&body).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        self.send(OutboundRequest::post_json(CHECKOUT_TRANSACTION_PATH, body))
            .await?;
        info!(%amount, "checkout transaction charged");
        Ok(())
    }

    /// Map a final call result onto the error taxonomy.
    async fn send(&self, request: OutboundRequest) -> Result<ApiCallResult> {
        let result = self.client.call(&request).await?;
        if result.success {
            return Ok(result);
        }
        if result.is_unauthorized() {
            return Err(Error::AuthenticationFailure { body: result.body });
        }
        Err(Error::Api {
            status: result.status,
            message: result.error_message().unwrap_or_default(),
        })
    }
}
