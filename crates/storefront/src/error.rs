//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Client errors carry a
//! human-readable message; server errors are captured to Sentry and answered
//! with a generic message so internals never leak. Bodies are always
//! `{ "message": ... }`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::coupons::CouponError;
use crate::services::inventory::InventoryError;
use crate::services::orders::OrderError;
use crate::services::payments::PaymentError;
use crate::services::wishlist::WishlistError;

const INTERNAL_MESSAGE: &str = "Internal server error";
const PROCESSOR_MESSAGE: &str = "Payment processor error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Wishlist error: {0}")]
    Wishlist(#[from] WishlistError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_owned())
}

fn coupon_status(err: &CouponError, invalid: StatusCode) -> (StatusCode, String) {
    let status = match err {
        CouponError::Repository(_) => return internal(),
        CouponError::NotFound | CouponError::InvalidCode(_) => invalid,
        CouponError::UnknownId => StatusCode::NOT_FOUND,
        CouponError::DuplicateCode => StatusCode::CONFLICT,
        CouponError::Inactive
        | CouponError::Expired
        | CouponError::AlreadyUsed
        | CouponError::MinimumSpend(_)
        | CouponError::InvalidEmail(_)
        | CouponError::CodeRequired
        | CouponError::InvalidValue(_) => StatusCode::BAD_REQUEST,
    };
    // Malformed codes read the same as unknown ones.
    let message = match err {
        CouponError::InvalidCode(_) => CouponError::NotFound.to_string(),
        other => other.to_string(),
    };
    (status, message)
}

fn payment_status(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        PaymentError::Http(_) | PaymentError::Processor { .. } => {
            (StatusCode::BAD_GATEWAY, PROCESSOR_MESSAGE.to_owned())
        }
        PaymentError::InvalidOrderId
        | PaymentError::AmountOutOfRange
        | PaymentError::NothingToCharge => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PaymentError::Order(order) => order_status(order),
    }
}

fn order_status(err: &OrderError) -> (StatusCode, String) {
    match err {
        OrderError::Repository(_) => internal(),
        // Every coupon rejection during order creation is a bad request.
        OrderError::Coupon(coupon) => coupon_status(coupon, StatusCode::BAD_REQUEST),
        OrderError::InsufficientStock(_) => (StatusCode::CONFLICT, err.to_string()),
        OrderError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        OrderError::Validation(_) | OrderError::InvalidEmail(_) | OrderError::UnknownProduct(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

impl AppError {
    /// Status code and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "Not found".to_owned())
            }
            Self::Database(_) | Self::Internal(_) => internal(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    (StatusCode::UNAUTHORIZED, AuthError::InvalidCredentials.to_string())
                }
                AuthError::UserAlreadyExists => (StatusCode::CONFLICT, err.to_string()),
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::NameRequired
                | AuthError::InvalidToken => (StatusCode::BAD_REQUEST, err.to_string()),
                AuthError::Repository(_) | AuthError::PasswordHash => internal(),
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                CatalogError::Repository(_) => internal(),
            },
            Self::Coupon(err) => coupon_status(err, StatusCode::NOT_FOUND),
            Self::Order(err) => order_status(err),
            Self::Inventory(err) => match err {
                InventoryError::Empty | InventoryError::NegativeStock(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                InventoryError::ProductNotFound => (StatusCode::NOT_FOUND, err.to_string()),
                InventoryError::Repository(_) => internal(),
            },
            Self::Wishlist(err) => match err {
                WishlistError::ProductNotFound => (StatusCode::NOT_FOUND, err.to_string()),
                WishlistError::Repository(_) => internal(),
            },
            Self::Payment(err) => payment_status(err),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_owned(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server and processor errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a checkout step.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use aurelia_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_coupon_status_depends_on_endpoint() {
        assert_eq!(
            get_status(CouponError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(OrderError::Coupon(CouponError::NotFound).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CouponError::Expired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CouponError::DuplicateCode.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_order_status_codes() {
        assert_eq!(
            get_status(OrderError::InsufficientStock("Opal Ring".to_owned()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(OrderError::UnknownProduct(ProductId::new(9)).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_payment_status_codes() {
        assert_eq!(
            get_status(PaymentError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(
                PaymentError::Processor {
                    status: 500,
                    message: "boom".to_owned()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(PaymentError::NothingToCharge.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let (status, message) =
            AppError::Database(RepositoryError::DataCorruption("bad row".to_owned()))
                .status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
