//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! used inside the `db` adapters. Every document the store persists has a
//! type here:
//!
//! - [`user`] - accounts, roles and one-time tokens
//! - [`catalog`] - categories, products and stock levels
//! - [`coupon`] - discount coupons and their redemption lists
//! - [`order`] - orders with customer snapshot and line items
//! - [`session`] - identity stored in the session cookie

pub mod catalog;
pub mod coupon;
pub mod order;
pub mod session;
pub mod user;

pub use catalog::{Category, NewCategory, NewProduct, Product, ProductFilter, StockUpdate};
pub use coupon::{Coupon, CouponRedemption, NewCoupon};
pub use order::{
    CustomerSnapshot, NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, ShippingAddress,
};
pub use session::{CurrentUser, session_keys};
pub use user::{IssuedToken, NewUser, TokenKind, User};
