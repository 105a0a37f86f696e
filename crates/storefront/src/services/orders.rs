//! Order placement and order administration.
//!
//! Placement prices every line from the product documents, re-checks the
//! coupon, then commits order, stock decrement and coupon redemption in a
//! single store call. Receipt and admin alert emails go out afterwards and
//! never fail the order.

use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use aurelia_core::{
    CurrencyCode, Email, EmailError, OrderId, OrderStatus, PaymentMethod, ProductId, UserId,
    UserRole, round_money,
};

use crate::db::{RepositoryError, Store};
use crate::models::{
    Coupon, CouponRedemption, CustomerSnapshot, NewOrder, NewOrderItem, Order, OrderFilter,
    ShippingAddress,
};
use crate::services::coupons::{CouponError, CouponService, compute_discount};
use crate::services::email::Notifier;

const ORDER_NUMBER_SUFFIX_LEN: usize = 9;
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Errors from order placement and order administration.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Unknown product {0}")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("Order not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One cart line as sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Shipping details as sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: ShippingAddress,
}

/// Order creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
    pub customer: CustomerDetails,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

/// Server-side pricing of a cart: unit prices from the product documents,
/// the coupon (if any) re-checked for the purchaser, and the totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub items: Vec<NewOrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon: Option<Coupon>,
}

/// Generate an order number: `ORD-<unix millis>-<9 uppercase alphanumerics>`.
#[must_use]
pub fn generate_order_number() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .filter_map(|_| ORDER_NUMBER_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("ORD-{}-{suffix}", chrono::Utc::now().timestamp_millis())
}

fn require(value: &str, field: &str) -> Result<(), OrderError> {
    if value.trim().is_empty() {
        return Err(OrderError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Validate and normalize cart lines, merging repeated products.
fn normalize_lines(lines: &[CartLine]) -> Result<Vec<CartLine>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Validation(
            "Order must contain at least one item".to_owned(),
        ));
    }

    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(OrderError::Validation(
                "Quantity must be at least 1".to_owned(),
            ));
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(
                    || OrderError::Validation("Quantity is too large".to_owned()),
                )?;
            }
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}

fn validate_customer(details: &CustomerDetails) -> Result<CustomerSnapshot, OrderError> {
    require(&details.name, "Name")?;
    require(&details.address.line1, "Address")?;
    require(&details.address.city, "City")?;
    require(&details.address.postal_code, "Postal code")?;
    require(&details.address.country, "Country")?;
    let email = Email::parse(&details.email)?;

    Ok(CustomerSnapshot {
        name: details.name.trim().to_owned(),
        email,
        phone: details
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned),
        address: details.address.clone(),
    })
}

/// Price `lines` and apply `coupon_code` for `email`.
///
/// # Errors
///
/// Returns `OrderError::Validation` for empty carts or bad quantities,
/// `OrderError::UnknownProduct` for ids not in the catalog and
/// `OrderError::Coupon` when the coupon does not apply.
pub async fn quote(
    store: &dyn Store,
    currency: CurrencyCode,
    lines: &[CartLine],
    coupon_code: Option<&str>,
    email: &Email,
) -> Result<Quote, OrderError> {
    let lines = normalize_lines(lines)?;
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let products = store.products_by_ids(&ids).await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or(OrderError::UnknownProduct(line.product_id))?;
        items.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }
    let subtotal = round_money(items.iter().map(NewOrderItem::line_total).sum());

    let coupon = match coupon_code.filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(
            CouponService::new(store, currency)
                .applicable(code, email, subtotal)
                .await?,
        ),
        None => None,
    };
    let discount = coupon.as_ref().map_or(Decimal::ZERO, |c| {
        compute_discount(c.discount_type, c.value, subtotal)
    });

    Ok(Quote {
        items,
        subtotal,
        discount,
        total: round_money(subtotal - discount),
        coupon,
    })
}

/// Order operations over the store.
pub struct OrderService<'a> {
    store: &'a dyn Store,
    notifier: &'a Notifier,
    currency: CurrencyCode,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, notifier: &'a Notifier, currency: CurrencyCode) -> Self {
        Self {
            store,
            notifier,
            currency,
        }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation`, `OrderError::InvalidEmail`,
    /// `OrderError::UnknownProduct` or `OrderError::Coupon` for bad input,
    /// and `OrderError::InsufficientStock` when a line exceeds stock. No
    /// order is written on any error.
    #[instrument(skip_all, fields(payment_method = %request.payment_method))]
    pub async fn place(
        &self,
        request: PlaceOrderRequest,
        user_id: Option<UserId>,
    ) -> Result<Order, OrderError> {
        let customer = validate_customer(&request.customer)?;
        let quote = quote(
            self.store,
            self.currency,
            &request.items,
            request.coupon_code.as_deref(),
            &customer.email,
        )
        .await?;

        let redemption = quote.coupon.as_ref().map(|c| CouponRedemption {
            coupon_id: c.id,
            email: customer.email.clone(),
        });
        let new_order = NewOrder {
            order_number: generate_order_number(),
            user_id,
            customer,
            items: quote.items,
            subtotal: quote.subtotal,
            discount: quote.discount,
            total: quote.total,
            coupon_code: quote.coupon.map(|c| c.code),
            payment_method: request.payment_method,
            payment_reference: request.payment_reference,
        };

        let order = self
            .store
            .place_order(new_order.clone(), redemption)
            .await
            .map_err(|e| match e {
                RepositoryError::InsufficientStock { product_id, .. } => {
                    let name = new_order
                        .items
                        .iter()
                        .find(|i| i.product_id == product_id)
                        .map_or_else(|| product_id.to_string(), |i| i.product_name.clone());
                    OrderError::InsufficientStock(name)
                }
                RepositoryError::CouponAlreadyRedeemed => {
                    OrderError::Coupon(CouponError::AlreadyUsed)
                }
                RepositoryError::NotFound => OrderError::Validation(
                    "Order references a product or coupon that no longer exists".to_owned(),
                ),
                other => OrderError::Repository(other),
            })?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );

        self.notify(&order).await;
        Ok(order)
    }

    /// Send the receipt and the admin alert; failures are logged only.
    async fn notify(&self, order: &Order) {
        if let Err(e) = self.notifier.send_order_receipt(order).await {
            tracing::warn!(order_number = %order.order_number, error = %e, "Failed to send order receipt");
        }

        let admins = match self.store.list_users(Some(UserRole::Admin)).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load admins for order alert");
                return;
            }
        };
        if admins.is_empty() {
            return;
        }

        let recipients = admins.into_iter().map(|u| u.email).collect();
        if let Err(e) = self
            .notifier
            .send_admin_order_alert(order, recipients)
            .await
        {
            tracing::warn!(order_number = %order.order_number, error = %e, "Failed to send admin order alert");
        }
    }

    // =========================================================================
    // Customer reads
    // =========================================================================

    /// Orders placed with `email`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn for_customer(&self, email: &Email) -> Result<Vec<Order>, OrderError> {
        let filter = OrderFilter {
            customer_email: Some(email.clone()),
            ..OrderFilter::default()
        };
        Ok(self.store.list_orders(&filter).await?)
    }

    /// One of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or belongs
    /// to someone else.
    pub async fn get_for_customer(&self, id: OrderId, email: &Email) -> Result<Order, OrderError> {
        self.store
            .order_by_id(id)
            .await?
            .filter(|o| &o.customer.email == email)
            .ok_or(OrderError::NotFound)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// All orders, optionally by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let filter = OrderFilter {
            status,
            ..OrderFilter::default()
        };
        Ok(self.store.list_orders(&filter).await?)
    }

    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store.order_by_id(id).await?.ok_or(OrderError::NotFound)
    }

    /// Set any status; there is no transition table.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        let order = self
            .store
            .update_order_status(id, status)
            .await
            .map_err(not_found)?;
        tracing::info!(order_id = %id, status = %status, "Order status updated");
        Ok(order)
    }

    /// Hard delete.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<(), OrderError> {
        self.store.delete_order(id).await.map_err(not_found)?;
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}

fn not_found(e: RepositoryError) -> OrderError {
    match e {
        RepositoryError::NotFound => OrderError::NotFound,
        other => OrderError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let mut parts = number.splitn(3, '-');
        assert_eq!(parts.next(), Some("ORD"));
        let millis = parts.next().unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        let suffix = parts.next().unwrap();
        assert_eq!(suffix.len(), ORDER_NUMBER_SUFFIX_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            normalize_lines(&[]),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(matches!(
            normalize_lines(&[line(1, 0)]),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_repeated_products_merged() {
        let merged = normalize_lines(&[line(1, 2), line(2, 1), line(1, 3)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.first().unwrap().quantity, 5);
    }

    #[test]
    fn test_customer_requires_address_fields() {
        let details = CustomerDetails {
            name: "Ruby".to_owned(),
            email: "ruby@example.com".to_owned(),
            phone: Some("  ".to_owned()),
            address: ShippingAddress {
                line1: "2 Facet Rd".to_owned(),
                line2: None,
                city: String::new(),
                state: None,
                postal_code: "10001".to_owned(),
                country: "US".to_owned(),
            },
        };
        let err = validate_customer(&details).unwrap_err();
        assert_eq!(err.to_string(), "City is required");

        let mut fixed = details;
        fixed.address.city = "New York".to_owned();
        let snapshot = validate_customer(&fixed).unwrap();
        assert_eq!(snapshot.phone, None);
    }
}
