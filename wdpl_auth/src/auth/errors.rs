//! Authentication error types.

use thiserror::Error;

use crate::db::StoreError;

/// Authentication errors
///
/// `InvalidCredentials`, `UserInactive` and `EmailExists` are domain outcomes the
/// boundary maps to user-visible responses. Everything else is internal.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, wrong password, or an unknown/expired/revoked refresh token.
    /// The cases are merged so callers cannot probe which one happened.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Correct credentials for a deactivated account
    #[error("User is inactive")]
    UserInactive,

    /// Email already registered
    #[error("User with this email already exists")]
    EmailExists,

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Access token signing failed
    #[error("Token signing failed: {0}")]
    SigningFailed(#[source] jsonwebtoken::errors::Error),

    /// A configured lifetime pushes an expiry past the representable range
    #[error("Token lifetime out of range")]
    ExpiryOutOfRange,

    /// Access token failed verification
    #[error("Invalid token")]
    InvalidToken,

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the error is an internal failure rather than a domain outcome
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::HashingFailed
                | AuthError::SigningFailed(_)
                | AuthError::ExpiryOutOfRange
                | AuthError::Store(_)
        )
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Store, hashing and signing errors collapse to a generic message; their
    /// detail belongs in operator logs only.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            return "internal error".to_string();
        }
        match self {
            AuthError::InvalidCredentials => "invalid credentials".to_string(),
            AuthError::UserInactive => "user is inactive".to_string(),
            AuthError::EmailExists => "user with this email already exists".to_string(),
            AuthError::InvalidToken => "invalid token".to_string(),
            _ => "internal error".to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authorization gate rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// No credential, or the credential failed verification
    #[error("Unauthorized")]
    Unauthorized,

    /// Verified identity whose role is not allowed
    #[error("Forbidden")]
    Forbidden,
}

/// Result type for gate checks
pub type GateResult<T> = Result<T, GateError>;
