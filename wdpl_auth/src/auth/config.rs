//! Immutable configuration for the credential and session core.

use argon2::Params;
use chrono::Duration;
use std::fmt;

/// Argon2id cost parameters (memory KiB, iterations, parallelism)
pub use argon2::Params as HasherParams;

/// Default access token lifetime in minutes
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Default refresh session lifetime in minutes
pub const DEFAULT_REFRESH_TOKEN_TTL_MINUTES: i64 = 30;

/// What happens to a session after it has been used to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// The used session stays valid; each refresh adds a new session row.
    ///
    /// Several devices can share one login chain, and two concurrent refreshes
    /// with the same token both succeed.
    #[default]
    Retain,

    /// The new session is minted first, then the used one is revoked through a
    /// conditional update.
    ///
    /// Refresh tokens become single-use: when two callers race on one token,
    /// only the caller whose conditional revoke lands gets new tokens, and the
    /// losers' fresh sessions are revoked again. A store failure while minting
    /// leaves the used session valid.
    Rotate,
}

impl RefreshPolicy {
    /// Parse a policy name (`retain` or `rotate`, case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "retain" => Some(Self::Retain),
            "rotate" => Some(Self::Rotate),
            _ => None,
        }
    }
}

/// Configuration consumed by [`AuthManager`](super::AuthManager) and
/// [`TokenCodec`](super::TokenCodec).
///
/// Built once at startup and shared behind an `Arc`. Nothing here changes at
/// runtime, so independent configurations can coexist (e.g. in parallel tests).
#[derive(Clone)]
pub struct AuthConfig {
    /// Symmetric HS256 signing secret. Should be at least 32 bytes; the server
    /// configuration enforces that, the codec does not.
    pub jwt_secret: String,

    /// Access token lifetime
    pub access_token_ttl: Duration,

    /// Refresh session lifetime
    pub refresh_token_ttl: Duration,

    /// Whether a refresh consumes the session it was called with
    pub refresh_policy: RefreshPolicy,

    /// Reload the user on refresh to put the current role into the new access
    /// token (and reject inactive users). When `false` the refreshed access
    /// token carries an empty role.
    pub rederive_role_on_refresh: bool,

    /// Argon2id cost parameters for new hashes
    pub hasher: Params,
}

impl AuthConfig {
    /// Create a configuration with default TTLs and hashing cost
    ///
    /// # Arguments
    ///
    /// * `jwt_secret` - Secret key for JWT signing
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl: Duration::minutes(DEFAULT_REFRESH_TOKEN_TTL_MINUTES),
            refresh_policy: RefreshPolicy::default(),
            rederive_role_on_refresh: false,
            hasher: Params::default(),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn with_role_rederivation(mut self, enabled: bool) -> Self {
        self.rederive_role_on_refresh = enabled;
        self
    }

    pub fn with_hasher_params(mut self, params: Params) -> Self {
        self.hasher = params;
        self
    }
}

// The secret must never reach logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("refresh_policy", &self.refresh_policy)
            .field("rederive_role_on_refresh", &self.rederive_role_on_refresh)
            .field("hasher", &self.hasher)
            .finish()
    }
}
