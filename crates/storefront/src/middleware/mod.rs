//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (propagate or mint `x-request-id`)
//! 4. Session layer (tower-sessions)
//! 5. Rate limiting on auth and coupon routes (governor)
//!
//! Role checks are extractors rather than layers, so each handler states
//! what it needs in its signature.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{auth_rate_limiter, coupon_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
