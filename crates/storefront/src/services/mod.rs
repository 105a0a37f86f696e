//! Business logic for the storefront and the back office.
//!
//! Services borrow the `Store` port and never touch SQL directly. Route
//! handlers build one per request from `AppState`.

pub mod auth;
pub mod catalog;
pub mod coupons;
pub mod dashboard;
pub mod email;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod wishlist;
