//! Authentication service.
//!
//! Password accounts with email verification and password reset. One-time
//! tokens are random 32-byte values sent by email; only their SHA-256
//! digest is stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::instrument;

use aurelia_core::{Email, UserId, UserRole};

use crate::db::{RepositoryError, Store};
use crate::models::{IssuedToken, NewUser, TokenKind, User};
use crate::services::email::Notifier;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Email verification links stay valid for 24 hours.
const VERIFICATION_TTL_HOURS: i64 = 24;

/// Password reset links stay valid for 1 hour.
const RESET_TTL_HOURS: i64 = 1;

/// Authentication service.
///
/// Handles registration, login, email verification and password reset.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    notifier: &'a Notifier,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, notifier: &'a Notifier) -> Self {
        Self { store, notifier }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer and send the verification email.
    ///
    /// The email is best-effort: a delivery failure is logged and the
    /// account is still created.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::NameRequired);
        }
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let (token, issued) = issue_token(Duration::hours(VERIFICATION_TTL_HOURS));
        let user = self
            .store
            .create_user(NewUser {
                email,
                name: name.to_owned(),
                password_hash,
                role: UserRole::Customer,
                verification: Some(issued),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        if let Err(e) = self.notifier.send_verification(&user, &token).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        tracing::info!(user_id = %user.id, "Customer registered");
        Ok(user)
    }

    /// Create an admin account (already verified). Used by the CLI.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`], without sending any email.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::NameRequired);
        }
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                name: name.to_owned(),
                password_hash,
                role: UserRole::Admin,
                verification: None,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        self.store.mark_email_verified(user.id).await?;

        Ok(User {
            email_verified: true,
            ..user
        })
    }

    /// Login with email and password.
    ///
    /// A malformed email is reported as invalid credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .store
            .user_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Email Verification
    // =========================================================================

    /// Mark the holder of a verification token as verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or expired.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let user = self
            .redeem_token(TokenKind::EmailVerification, token)
            .await?;
        self.store.mark_email_verified(user.id).await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(User {
            email_verified: true,
            ..user
        })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue and email a reset token if the account exists.
    ///
    /// Always succeeds for unknown or malformed emails so callers cannot
    /// probe which accounts exist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    #[instrument(skip_all)]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(());
        };
        let Some(user) = self.store.user_by_email(&email).await? else {
            return Ok(());
        };

        let (token, issued) = issue_token(Duration::hours(RESET_TTL_HOURS));
        self.store
            .set_token(user.id, TokenKind::PasswordReset, Some(issued))
            .await?;

        if let Err(e) = self.notifier.send_password_reset(&user, &token).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send password reset email");
        }
        Ok(())
    }

    /// Set a new password using a reset token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::InvalidToken`.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let user = self.redeem_token(TokenKind::PasswordReset, token).await?;

        let password_hash = hash_password(new_password)?;
        self.store.set_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Look up and clear a one-time token, checking expiry.
    async fn redeem_token(&self, kind: TokenKind, token: &str) -> Result<User, AuthError> {
        let (user, expires_at) = self
            .store
            .user_by_token(kind, &digest_token(token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if expires_at < Utc::now() {
            return Err(AuthError::InvalidToken);
        }

        self.store.set_token(user.id, kind, None).await?;
        Ok(user)
    }
}

/// Generate a one-time token and the record to store for it.
fn issue_token(ttl: Duration) -> (String, IssuedToken) {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let token = hex::encode(bytes);

    let issued = IssuedToken {
        token_hash: digest_token(&token),
        expires_at: Utc::now() + ttl,
    };
    (token, issued)
}

/// SHA-256 hex digest of a token.
fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use aurelia_core::CurrencyCode;

    use super::*;
    use crate::db::{MemoryStore, UserStore};
    use crate::services::email::LogMailer;

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(LogMailer), "http://localhost:3000", CurrencyCode::USD)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_issued_token_stores_digest_only() {
        let (token, issued) = issue_token(Duration::hours(1));
        assert_eq!(token.len(), 64);
        assert_ne!(issued.token_hash, token);
        assert_eq!(issued.token_hash, digest_token(&token));
        assert!(issued.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);

        let user = auth
            .register("Pearl@Example.com", "lustrous-pearl", "Pearl")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "pearl@example.com");
        assert_eq!(user.role, UserRole::Customer);
        assert!(!user.email_verified);

        let logged_in = auth
            .login("pearl@example.com", "lustrous-pearl")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);

        auth.register("a@example.com", "password-one", "A")
            .await
            .unwrap();
        let err = auth
            .register("A@example.com", "password-two", "A")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);
        auth.register("a@example.com", "password-one", "A")
            .await
            .unwrap();

        for (email, password) in [
            ("a@example.com", "wrong-password"),
            ("nobody@example.com", "password-one"),
            ("not-an-email", "password-one"),
        ] {
            let err = auth.login(email, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);
        let user = auth
            .register("a@example.com", "password-one", "A")
            .await
            .unwrap();

        let (token, issued) = issue_token(Duration::hours(1));
        store
            .set_token(user.id, TokenKind::PasswordReset, Some(issued))
            .await
            .unwrap();

        auth.reset_password(&token, "password-two").await.unwrap();
        assert!(auth.login("a@example.com", "password-two").await.is_ok());
        assert!(matches!(
            auth.reset_password(&token, "password-three").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_verification_token_rejected() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);
        let user = auth
            .register("a@example.com", "password-one", "A")
            .await
            .unwrap();

        let (token, issued) = issue_token(Duration::hours(-1));
        store
            .set_token(user.id, TokenKind::EmailVerification, Some(issued))
            .await
            .unwrap();

        assert!(matches!(
            auth.verify_email(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_email_marks_user() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);
        let user = auth
            .register("a@example.com", "password-one", "A")
            .await
            .unwrap();

        let (token, issued) = issue_token(Duration::hours(24));
        store
            .set_token(user.id, TokenKind::EmailVerification, Some(issued))
            .await
            .unwrap();

        let verified = auth.verify_email(&token).await.unwrap();
        assert!(verified.email_verified);
        assert!(auth.get_user(user.id).await.unwrap().email_verified);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_ok() {
        let store = MemoryStore::new();
        let notifier = notifier();
        let auth = AuthService::new(&store, &notifier);
        assert!(auth.forgot_password("ghost@example.com").await.is_ok());
        assert!(auth.forgot_password("not an email").await.is_ok());
    }
}
