//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! aurelia-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//! ```

use std::sync::Arc;

use thiserror::Error;

use aurelia_core::CurrencyCode;
use aurelia_storefront::db::PgStore;
use aurelia_storefront::services::auth::{AuthError, AuthService};
use aurelia_storefront::services::email::{LogMailer, Notifier};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// User already exists.
    #[error("A user already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Create a verified admin account.
///
/// # Returns
///
/// The ID of the created admin user.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<i32, AdminError> {
    let store = PgStore::new(connect().await?);
    // No mail goes out for admin creation; the notifier is only a dependency.
    let notifier = Notifier::new(Arc::new(LogMailer), "", CurrencyCode::default());

    tracing::info!("Creating admin user: {}", email);

    let user = AuthService::new(&store, &notifier)
        .create_admin(email, password, name)
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => AdminError::UserExists(email.to_owned()),
            other => AdminError::Auth(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id.as_i32())
}
