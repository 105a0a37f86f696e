//! Core types for Aurelia.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coupon_code;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use coupon_code::{CouponCode, CouponCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, round_money};
pub use status::*;
