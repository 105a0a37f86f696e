//! Wallet processor client.
//!
//! Every call first exchanges the client credentials for a short-lived
//! bearer token, then creates or captures a checkout order.

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use aurelia_core::{CurrencyCode, round_money};

use super::{PaymentError, processor_error};
use crate::config::WalletConfig;

/// Order created at the wallet processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOrder {
    pub id: String,
}

/// Result of capturing an approved wallet order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCapture {
    pub id: String,
    pub status: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Request body for a capture-intent order.
fn order_body(total: Decimal, currency: CurrencyCode) -> serde_json::Value {
    serde_json::json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "amount": {
                "currency_code": currency.code(),
                "value": format!("{:.2}", round_money(total)),
            }
        }]
    })
}

/// Wallet processor client.
#[derive(Clone)]
pub struct WalletClient {
    inner: Arc<WalletClientInner>,
}

struct WalletClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    api_base: String,
}

impl WalletClient {
    #[must_use]
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            inner: Arc::new(WalletClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
            }),
        }
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let url = format!("{}/v1/oauth2/token", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(
                &self.inner.client_id,
                Some(self.inner.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(processor_error(response).await);
        }

        let token: AccessToken = response.json().await?;
        Ok(token.access_token)
    }

    /// Create an order for `total`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if a request fails and
    /// `PaymentError::Processor` if the processor rejects it.
    #[instrument(skip(self), fields(total = %total))]
    pub async fn create_order(
        &self,
        total: Decimal,
        currency: CurrencyCode,
    ) -> Result<WalletOrder, PaymentError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&order_body(total, currency))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = processor_error(response).await;
            tracing::error!(error = %err, "Wallet order creation failed");
            return Err(err);
        }

        let order: WalletOrder = response.json().await?;
        tracing::info!(wallet_order_id = %order.id, "Wallet order created");
        Ok(order)
    }

    /// Capture an approved order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if a request fails and
    /// `PaymentError::Processor` if the processor rejects it.
    #[instrument(skip(self))]
    pub async fn capture_order(&self, order_id: &str) -> Result<WalletCapture, PaymentError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v2/checkout/orders/{order_id}/capture",
            self.inner.api_base
        );
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = processor_error(response).await;
            tracing::error!(error = %err, "Wallet capture failed");
            return Err(err);
        }

        let capture: WalletCapture = response.json().await?;
        tracing::info!(wallet_order_id = %capture.id, status = %capture.status, "Wallet order captured");
        Ok(capture)
    }
}
