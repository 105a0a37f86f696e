//! Hosted card checkout client.
//!
//! Speaks the form-encoded checkout-session API: bracketed keys for nested
//! line items, bearer authentication with the secret key, amounts in minor
//! units.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use aurelia_core::CurrencyCode;

use super::{PaymentError, processor_error};
use crate::config::CardProcessorConfig;

/// One line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub quantity: i32,
}

/// Parameters for a new checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub lines: Vec<CheckoutLine>,
    pub currency: CurrencyCode,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Flatten into form fields.
    fn form_fields(&self) -> Vec<(String, String)> {
        let currency = self.currency.code().to_ascii_lowercase();
        let mut fields = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("success_url".to_owned(), self.success_url.clone()),
            ("cancel_url".to_owned(), self.cancel_url.clone()),
            ("customer_email".to_owned(), self.customer_email.clone()),
        ];
        for (i, line) in self.lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((
                format!("{prefix}[price_data][currency]"),
                currency.clone(),
            ));
            fields.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            fields.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.to_string(),
            ));
            fields.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }
        fields
    }
}

/// Session created by the processor; the client redirects to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Card processor client.
#[derive(Clone)]
pub struct CardClient {
    inner: Arc<CardClientInner>,
}

struct CardClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    api_base: String,
}

impl CardClient {
    #[must_use]
    pub fn new(config: &CardProcessorConfig) -> Self {
        Self {
            inner: Arc::new(CardClientInner {
                client: reqwest::Client::new(),
                secret_key: config.secret_key.clone(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
            }),
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the request fails and
    /// `PaymentError::Processor` if the processor rejects it.
    #[instrument(skip_all, fields(lines = request.lines.len()))]
    pub async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/checkout/sessions", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&request.form_fields())
            .send()
            .await?;

        if !response.status().is_success() {
            let err = processor_error(response).await;
            tracing::error!(error = %err, "Card checkout session failed");
            return Err(err);
        }

        let session: CheckoutSession = response.json().await?;
        tracing::info!(session_id = %session.id, "Card checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_are_bracketed_per_line() {
        let request = CheckoutSessionRequest {
            lines: vec![
                CheckoutLine {
                    name: "Opal Ring".to_owned(),
                    unit_amount: 4000,
                    quantity: 2,
                },
                CheckoutLine {
                    name: "Pearl Studs".to_owned(),
                    unit_amount: 1999,
                    quantity: 1,
                },
            ],
            currency: CurrencyCode::USD,
            customer_email: "ruby@example.com".to_owned(),
            success_url: "https://shop.test/checkout/success".to_owned(),
            cancel_url: "https://shop.test/cart".to_owned(),
        };

        let fields = request.form_fields();
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(
            get("line_items[1][price_data][product_data][name]"),
            Some("Pearl Studs")
        );
        assert_eq!(get("line_items[1][price_data][unit_amount]"), Some("1999"));
        assert_eq!(get("line_items[2][quantity]"), None);
    }
}
