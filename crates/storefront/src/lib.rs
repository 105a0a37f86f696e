//! Aurelia Jewels storefront library.
//!
//! The JSON API for the shop and its back office, exposed as a library so
//! the binary, the CLI and the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware::from_fn};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::state::AppState;

/// Build the application router.
///
/// Layers, outermost first: request tracing, request ID, sessions. Sentry
/// layers are added by the binary.
pub fn app<S>(state: AppState, session_store: S, secure_cookies: bool, rate_limit: bool) -> Router
where
    S: SessionStore + Clone,
{
    routes::routes(rate_limit)
        .layer(middleware::create_session_layer(session_store, secure_cookies))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
