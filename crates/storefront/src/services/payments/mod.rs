//! Payment processor clients and checkout orchestration.
//!
//! Card payments redirect the buyer to a hosted checkout page. Wallet
//! payments create an order server-side which is captured once the buyer
//! approves it. Neither path writes anything locally; the order document
//! is only created by `POST /api/orders` after payment succeeds.

mod card;
mod wallet;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use aurelia_core::{CurrencyCode, Email, Price};

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::orders::{CartLine, OrderError, Quote, quote};

pub use card::{CardClient, CheckoutLine, CheckoutSession, CheckoutSessionRequest};
pub use wallet::{WalletCapture, WalletClient, WalletOrder};

/// Name of the single aggregated line sent when a coupon applies.
const DISCOUNTED_ORDER_LINE: &str = "Aurelia Jewels order";

/// Errors from payment processors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The processor has no credentials configured.
    #[error("Payment provider not configured")]
    NotConfigured,

    /// HTTP request to the processor failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor answered with a non-success status.
    #[error("Processor error: {status} - {message}")]
    Processor { status: u16, message: String },

    /// Wallet order id is not a processor id.
    #[error("Invalid wallet order id")]
    InvalidOrderId,

    /// An amount could not be expressed in minor units.
    #[error("Amount out of range")]
    AmountOutOfRange,

    /// The discounted total is zero, so there is nothing to send to a
    /// processor; the order is placed directly instead.
    #[error("Order total is zero; no payment is required")]
    NothingToCharge,

    /// Pricing the cart failed.
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Read a failed processor response into `PaymentError::Processor`.
async fn processor_error(response: reqwest::Response) -> PaymentError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    PaymentError::Processor { status, message }
}

/// Processor ids are short ASCII tokens; anything else never reaches a URL.
fn is_processor_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Configured processor clients. Either may be absent.
#[derive(Clone, Default)]
pub struct PaymentClients {
    card: Option<CardClient>,
    wallet: Option<WalletClient>,
}

impl PaymentClients {
    #[must_use]
    pub const fn new(card: Option<CardClient>, wallet: Option<WalletClient>) -> Self {
        Self { card, wallet }
    }

    /// Build clients for every processor present in `config`.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            card: config.card.as_ref().map(CardClient::new),
            wallet: config.wallet.as_ref().map(WalletClient::new),
        }
    }

    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if no card processor is set up.
    pub fn card(&self) -> Result<&CardClient, PaymentError> {
        self.card.as_ref().ok_or(PaymentError::NotConfigured)
    }

    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if no wallet processor is set up.
    pub fn wallet(&self) -> Result<&WalletClient, PaymentError> {
        self.wallet.as_ref().ok_or(PaymentError::NotConfigured)
    }
}

/// Cart submitted to start a payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub email: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Processors reject zero-amount charges.
fn ensure_chargeable(quote: &Quote) -> Result<(), PaymentError> {
    if quote.total <= Decimal::ZERO {
        return Err(PaymentError::NothingToCharge);
    }
    Ok(())
}

/// Line items for a card checkout session.
///
/// Without a discount every cart line is sent as-is. With a discount the
/// processor gets one line carrying the discounted total.
///
/// # Errors
///
/// Returns `PaymentError::NothingToCharge` for a zero total and
/// `PaymentError::AmountOutOfRange` if an amount overflows.
pub fn checkout_lines(quote: &Quote, currency: CurrencyCode) -> Result<Vec<CheckoutLine>, PaymentError> {
    let minor = |amount: Decimal| {
        Price::new(amount, currency)
            .minor_units()
            .ok_or(PaymentError::AmountOutOfRange)
    };

    ensure_chargeable(quote)?;

    if quote.discount > Decimal::ZERO {
        let name = quote.coupon.as_ref().map_or_else(
            || DISCOUNTED_ORDER_LINE.to_owned(),
            |c| format!("{DISCOUNTED_ORDER_LINE} ({})", c.code),
        );
        return Ok(vec![CheckoutLine {
            name,
            unit_amount: minor(quote.total)?,
            quantity: 1,
        }]);
    }

    quote
        .items
        .iter()
        .map(|item| {
            Ok(CheckoutLine {
                name: item.product_name.clone(),
                unit_amount: minor(item.unit_price)?,
                quantity: item.quantity,
            })
        })
        .collect()
}

/// Starts card and wallet payments for a server-priced cart.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    payments: &'a PaymentClients,
    currency: CurrencyCode,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        payments: &'a PaymentClients,
        currency: CurrencyCode,
        base_url: &'a str,
    ) -> Self {
        Self {
            store,
            payments,
            currency,
            base_url,
        }
    }

    async fn quote(&self, request: &CheckoutRequest) -> Result<Quote, PaymentError> {
        let email = Email::parse(&request.email).map_err(OrderError::from)?;
        Ok(quote(
            self.store,
            self.currency,
            &request.items,
            request.coupon_code.as_deref(),
            &email,
        )
        .await?)
    }

    /// Create a hosted card checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` without a card processor,
    /// `PaymentError::Order` when the cart or coupon is rejected, and
    /// `PaymentError::Http`/`Processor` when the processor call fails.
    #[instrument(skip_all)]
    pub async fn card_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let client = self.payments.card()?;
        let quote = self.quote(&request).await?;
        let base = self.base_url.trim_end_matches('/');

        client
            .create_session(&CheckoutSessionRequest {
                lines: checkout_lines(&quote, self.currency)?,
                currency: self.currency,
                customer_email: request.email.trim().to_owned(),
                success_url: format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
                cancel_url: format!("{base}/cart"),
            })
            .await
    }

    /// Create a wallet order for the discounted total.
    ///
    /// # Errors
    ///
    /// Same as [`Self::card_session`], for the wallet processor.
    #[instrument(skip_all)]
    pub async fn wallet_order(&self, request: CheckoutRequest) -> Result<WalletOrder, PaymentError> {
        let client = self.payments.wallet()?;
        let quote = self.quote(&request).await?;
        ensure_chargeable(&quote)?;
        client.create_order(quote.total, self.currency).await
    }

    /// Capture an approved wallet order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` without a wallet processor,
    /// `PaymentError::InvalidOrderId` for ids that cannot be a processor id
    /// and `PaymentError::Http`/`Processor` when the capture fails.
    #[instrument(skip(self))]
    pub async fn wallet_capture(&self, order_id: &str) -> Result<WalletCapture, PaymentError> {
        let client = self.payments.wallet()?;
        if !is_processor_id(order_id) {
            return Err(PaymentError::InvalidOrderId);
        }
        client.capture_order(order_id).await
    }
}
