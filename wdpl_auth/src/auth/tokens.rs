//! Token codec: signed, time-bounded access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::{
    config::AuthConfig,
    errors::{AuthError, AuthResult},
    models::{AccessClaims, UserId},
};

/// The only algorithm this codec signs with or accepts
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Creates and verifies HS256 access tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec keyed by a symmetric secret
    pub fn new(secret: &[u8]) -> Self {
        // Pinning the algorithm rejects `none` and any alg swap in the header.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a codec from the configured signing secret
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes())
    }

    /// Issue an access token
    ///
    /// # Arguments
    ///
    /// * `user_id` - Subject of the token
    /// * `role` - Role tag carried in the claims (may be empty)
    /// * `ttl` - Lifetime from now
    ///
    /// # Returns
    ///
    /// * `AuthResult<(String, DateTime<Utc>)>` - Signed token and its expiry
    ///
    /// # Errors
    ///
    /// * `AuthError::ExpiryOutOfRange` - `ttl` overflows the calendar
    /// * `AuthError::SigningFailed` - Encoding or signing failed
    pub fn issue(
        &self,
        user_id: UserId,
        role: &str,
        ttl: Duration,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        let claims = AccessClaims {
            sub: user_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &self.encoding_key,
        )
        .map_err(AuthError::SigningFailed)?;

        Ok((token, expires_at))
    }

    /// Verify an access token and return its claims
    ///
    /// Fails closed on malformed input, a bad signature, a different algorithm,
    /// missing claims, or an `exp` in the past.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Any verification failure
    pub fn verify(&self, token: &str) -> AuthResult<AccessClaims> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                log::debug!("Access token rejected: {}", e);
                AuthError::InvalidToken
            })?;

        Ok(token_data.claims)
    }
}
