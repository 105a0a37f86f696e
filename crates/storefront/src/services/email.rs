//! Transactional email: order receipts, admin alerts and account emails.
//!
//! Messages are rendered from Askama templates (HTML and plain text) and
//! handed to a [`Mailer`]. Production uses [`SmtpMailer`] (lettre over
//! STARTTLS); without SMTP configuration [`LogMailer`] only logs.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use aurelia_core::{CurrencyCode, Email, Price};

use crate::config::SmtpConfig;
use crate::models::{Order, User};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Message has no recipients.
    #[error("no recipients")]
    NoRecipients,

    /// Transport-specific failure.
    #[error("{0}")]
    Transport(String),
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<Email>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Delivery port for rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message to all of its recipients.
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer from SMTP configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_owned(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if email.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .subject(&email.subject);
        for to in &email.to {
            builder = builder.to(to
                .as_str()
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?);
        }

        let message = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text_body),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html_body),
                ),
        )?;

        self.transport.send(message).await?;

        tracing::info!(recipients = email.to.len(), subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Mailer that only logs; used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            recipients = email.to.len(),
            subject = %email.subject,
            "SMTP not configured, email not delivered"
        );
        Ok(())
    }
}

// =============================================================================
// Templates
// =============================================================================

/// One order line, preformatted for templates.
struct LineView {
    name: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

/// Order fields shared by the receipt and the admin alert.
struct OrderView<'a> {
    order_number: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
    lines: Vec<LineView>,
    subtotal: String,
    discount: Option<String>,
    coupon_code: Option<&'a str>,
    total: String,
    payment_method: &'static str,
}

impl<'a> OrderView<'a> {
    fn new(order: &'a Order, currency: CurrencyCode) -> Self {
        let money = |amount| Price::new(amount, currency).display();
        Self {
            order_number: &order.order_number,
            customer_name: &order.customer.name,
            customer_email: order.customer.email.as_str(),
            lines: order
                .items
                .iter()
                .map(|item| LineView {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: money(item.unit_price),
                    line_total: money(item.line_total()),
                })
                .collect(),
            subtotal: money(order.subtotal),
            discount: (!order.discount.is_zero()).then(|| money(order.discount)),
            coupon_code: order.coupon_code.as_ref().map(|c| c.as_str()),
            total: money(order.total),
            payment_method: order.payment_method.as_str(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_receipt.html")]
struct OrderReceiptHtml<'a> {
    order: &'a OrderView<'a>,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_receipt.txt")]
struct OrderReceiptText<'a> {
    order: &'a OrderView<'a>,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/admin_order_alert.html")]
struct AdminOrderAlertHtml<'a> {
    order: &'a OrderView<'a>,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/admin_order_alert.txt")]
struct AdminOrderAlertText<'a> {
    order: &'a OrderView<'a>,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    link: &'a str,
}

// =============================================================================
// Notifier
// =============================================================================

/// Renders transactional emails and hands them to the mailer.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    base_url: String,
    currency: CurrencyCode,
}

impl Notifier {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, base_url: &str, currency: CurrencyCode) -> Self {
        Self {
            mailer,
            base_url: base_url.trim_end_matches('/').to_owned(),
            currency,
        }
    }

    /// Send the purchase receipt to the customer on the order.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_order_receipt(&self, order: &Order) -> Result<(), MailError> {
        let view = OrderView::new(order, self.currency);
        let account_url = format!("{}/account/orders", self.base_url);
        let html = OrderReceiptHtml {
            order: &view,
            account_url: &account_url,
        }
        .render()?;
        let text = OrderReceiptText {
            order: &view,
            account_url: &account_url,
        }
        .render()?;

        self.mailer
            .send(OutgoingEmail {
                to: vec![order.customer.email.clone()],
                subject: format!("Your Aurelia Jewels order {}", order.order_number),
                text_body: text,
                html_body: html,
            })
            .await
    }

    /// Send one new-order alert addressed to every admin.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_admin_order_alert(
        &self,
        order: &Order,
        admins: Vec<Email>,
    ) -> Result<(), MailError> {
        let view = OrderView::new(order, self.currency);
        let admin_url = format!("{}/admin/orders/{}", self.base_url, order.id);
        let html = AdminOrderAlertHtml {
            order: &view,
            admin_url: &admin_url,
        }
        .render()?;
        let text = AdminOrderAlertText {
            order: &view,
            admin_url: &admin_url,
        }
        .render()?;

        self.mailer
            .send(OutgoingEmail {
                to: admins,
                subject: format!(
                    "New order {} ({})",
                    order.order_number,
                    Price::new(order.total, self.currency).display()
                ),
                text_body: text,
                html_body: html,
            })
            .await
    }

    /// Send the email verification link.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_verification(&self, user: &User, token: &str) -> Result<(), MailError> {
        let link = format!("{}/verify-email?token={token}", self.base_url);
        let html = VerifyEmailHtml {
            name: &user.name,
            link: &link,
        }
        .render()?;
        let text = VerifyEmailText {
            name: &user.name,
            link: &link,
        }
        .render()?;

        self.mailer
            .send(OutgoingEmail {
                to: vec![user.email.clone()],
                subject: "Verify your Aurelia Jewels account".to_owned(),
                text_body: text,
                html_body: html,
            })
            .await
    }

    /// Send the password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_password_reset(&self, user: &User, token: &str) -> Result<(), MailError> {
        let link = format!("{}/reset-password?token={token}", self.base_url);
        let html = PasswordResetHtml {
            name: &user.name,
            link: &link,
        }
        .render()?;
        let text = PasswordResetText {
            name: &user.name,
            link: &link,
        }
        .render()?;

        self.mailer
            .send(OutgoingEmail {
                to: vec![user.email.clone()],
                subject: "Reset your Aurelia Jewels password".to_owned(),
                text_body: text,
                html_body: html,
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use aurelia_core::{OrderId, OrderStatus, PaymentMethod, ProductId};

    use super::*;
    use crate::models::{CustomerSnapshot, OrderItem, ShippingAddress};

    #[derive(Default)]
    struct Outbox(Mutex<Vec<OutgoingEmail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            self.0.lock().await.push(email);
            Ok(())
        }
    }

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            order_number: "ORD-1-ABCDEFGHI".to_owned(),
            user_id: None,
            customer: CustomerSnapshot {
                name: "Ada <Admin>".to_owned(),
                email: Email::parse("ada@example.com").unwrap(),
                phone: None,
                address: ShippingAddress {
                    line1: "1 Gem St".to_owned(),
                    line2: None,
                    city: "Lyon".to_owned(),
                    state: None,
                    postal_code: "69001".to_owned(),
                    country: "FR".to_owned(),
                },
            },
            items: vec![OrderItem {
                product_id: ProductId::new(1),
                product_name: "Opal Ring".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(4500, 2),
            }],
            subtotal: Decimal::new(9000, 2),
            discount: Decimal::new(900, 2),
            total: Decimal::new(8100, 2),
            coupon_code: None,
            payment_method: PaymentMethod::Card,
            payment_reference: None,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_receipt_goes_to_customer_with_totals() {
        let outbox = Arc::new(Outbox::default());
        let notifier = Notifier::new(outbox.clone(), "https://shop.test/", CurrencyCode::USD);

        notifier.send_order_receipt(&order()).await.unwrap();

        let sent = outbox.0.lock().await;
        assert_eq!(sent.len(), 1);
        let email = sent.first().unwrap();
        assert_eq!(email.to, vec![Email::parse("ada@example.com").unwrap()]);
        assert!(email.subject.contains("ORD-1-ABCDEFGHI"));
        assert!(email.text_body.contains("$81.00"));
        assert!(email.text_body.contains("Opal Ring"));
        assert!(email.text_body.contains("https://shop.test/account/orders"));
    }

    #[tokio::test]
    async fn test_html_escapes_customer_name() {
        let outbox = Arc::new(Outbox::default());
        let notifier = Notifier::new(outbox.clone(), "https://shop.test", CurrencyCode::USD);

        notifier.send_order_receipt(&order()).await.unwrap();

        let sent = outbox.0.lock().await;
        let email = sent.first().unwrap();
        assert!(!email.html_body.contains("<Admin>"));
        assert!(email.text_body.contains("Ada <Admin>"));
    }

    #[tokio::test]
    async fn test_admin_alert_is_one_message_to_all_admins() {
        let outbox = Arc::new(Outbox::default());
        let notifier = Notifier::new(outbox.clone(), "https://shop.test", CurrencyCode::USD);
        let admins = vec![
            Email::parse("a@shop.test").unwrap(),
            Email::parse("b@shop.test").unwrap(),
        ];

        notifier
            .send_admin_order_alert(&order(), admins.clone())
            .await
            .unwrap();

        let sent = outbox.0.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.first().unwrap().to, admins);
    }
}
