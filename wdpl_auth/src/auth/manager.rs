//! Authentication manager implementation.
//!
//! Session lifecycle: a session is `Active` until its expiry passes (`Expired`,
//! derived at read time) or it is revoked (`Revoked`, terminal). Nothing goes
//! back to `Active`.
//!
//! Operations issue independent store calls with no surrounding transaction.
//! Email uniqueness is finally guaranteed by the store; a conflict on insert is
//! reported as `EmailExists` like the up-front check.

use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    config::{AuthConfig, RefreshPolicy},
    errors::{AuthError, AuthResult},
    models::{
        AccessClaims, AuthTokens, DEFAULT_ROLE, DeviceInfo, Session, SessionId, User, UserId,
    },
    password::CredentialHasher,
    tokens::TokenCodec,
};
use crate::db::{Database, SessionRepository, StoreError, UserRepository};

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    hasher: CredentialHasher,
    codec: TokenCodec,
    config: Arc<AuthConfig>,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `users` - Identity store
    /// * `sessions` - Session store
    /// * `config` - Signing secret, TTLs and policies
    ///
    /// # Returns
    ///
    /// * `AuthManager` - New authentication manager instance
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher: CredentialHasher::new(config.hasher.clone()),
            codec: TokenCodec::from_config(&config),
            config,
        }
    }

    /// Create a manager backed by the Postgres stores of `db`
    pub fn with_postgres(db: &Database, config: Arc<AuthConfig>) -> Self {
        Self::new(
            Arc::new(db.user_repository()),
            Arc::new(db.session_repository()),
            config,
        )
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Codec used for access tokens, for callers that run the gate themselves
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Register a new user and open a first session
    ///
    /// The email is stored and compared exactly as given.
    ///
    /// # Returns
    ///
    /// * `AuthResult<(User, AuthTokens)>` - Created user and its token pair
    ///
    /// # Errors
    ///
    /// * `AuthError::EmailExists` - Email already registered (checked up front and
    ///   on insert)
    /// * `AuthError::HashingFailed` - Password could not be hashed
    /// * `AuthError::ExpiryOutOfRange` - Configured TTLs overflow; nothing is written
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<(User, AuthTokens)> {
        self.check_lifetimes()?;

        if self.users.get_user_by_email(email).await?.is_some() {
            warn!("Registration rejected: email already registered");
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.hash_password(password).await?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match self.users.create_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                warn!("Registration lost a race on email uniqueness");
                return Err(AuthError::EmailExists);
            }
            Err(e) => return Err(e.into()),
        }

        let (_, tokens) = self
            .issue_tokens(user.id, &user.role, DeviceInfo::default())
            .await?;

        info!("Registered user {}", user.id);
        Ok((user, tokens))
    }

    /// Login a user
    ///
    /// # Arguments
    ///
    /// * `email` - Login key
    /// * `password` - Plaintext password
    /// * `device` - User agent / IP recorded on the new session
    ///
    /// # Returns
    ///
    /// * `AuthResult<(User, AuthTokens)>` - User and session tokens or error
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    ///   (indistinguishable)
    /// * `AuthError::UserInactive` - Credentials valid but account deactivated
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: DeviceInfo,
    ) -> AuthResult<(User, AuthTokens)> {
        let Some(user) = self.users.get_user_by_email(email).await? else {
            self.burn_verification(password).await;
            warn!("Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await {
            warn!("Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!("Login rejected: user {} is inactive", user.id);
            return Err(AuthError::UserInactive);
        }

        let (_, tokens) = self.issue_tokens(user.id, &user.role, device).await?;

        info!("User {} logged in", user.id);
        Ok((user, tokens))
    }

    /// Mint a new access token and session from a refresh token
    ///
    /// With the default configuration the role is not re-derived (the new
    /// access token carries an empty role), `is_active` is not re-checked, and
    /// the used session stays valid. See [`RefreshPolicy`] and
    /// [`AuthConfig::rederive_role_on_refresh`].
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Token unknown, revoked or expired
    ///   (indistinguishable), or lost a rotation race
    /// * `AuthError::UserInactive` - Only when role re-derivation is enabled
    pub async fn refresh(&self, refresh_token: &str, device: DeviceInfo) -> AuthResult<AuthTokens> {
        let now = Utc::now();
        let session = match self.sessions.get_session_by_token(refresh_token).await? {
            Some(session) if session.is_valid_at(now) => session,
            _ => {
                warn!("Refresh rejected: invalid refresh token");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let role = if self.config.rederive_role_on_refresh {
            let user = self
                .users
                .get_user_by_id(session.user_id)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            if !user.is_active {
                warn!("Refresh rejected: user {} is inactive", user.id);
                return Err(AuthError::UserInactive);
            }
            user.role
        } else {
            String::new()
        };

        let (minted, tokens) = self.issue_tokens(session.user_id, &role, device).await?;

        // Rotation: the used session is retired only once its successor exists.
        if self.config.refresh_policy == RefreshPolicy::Rotate
            && !self.sessions.revoke_session(session.id).await?
        {
            self.sessions.revoke_session(minted).await?;
            warn!("Refresh rejected: session {} already consumed", session.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("Refreshed session {} for user {}", session.id, session.user_id);
        Ok(tokens)
    }

    /// Revoke the session holding `refresh_token` (sign-out)
    ///
    /// An unknown or already revoked token is a successful no-op.
    pub async fn revoke_session(&self, refresh_token: &str) -> AuthResult<()> {
        match self.sessions.get_session_by_token(refresh_token).await? {
            Some(session) => self.revoke_by_id(session.id).await,
            None => Ok(()),
        }
    }

    /// Revoke a session by its own identifier
    ///
    /// An unknown or already revoked session is a successful no-op.
    pub async fn revoke_by_id(&self, session_id: SessionId) -> AuthResult<()> {
        if self.sessions.revoke_session(session_id).await? {
            info!("Revoked session {}", session_id);
        }
        Ok(())
    }

    /// Verify an access token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Malformed, badly signed or expired
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.codec.verify(token)
    }

    /// Fail before any write when a configured TTL cannot produce an expiry
    fn check_lifetimes(&self) -> AuthResult<()> {
        let now = Utc::now();
        for ttl in [self.config.access_token_ttl, self.config.refresh_token_ttl] {
            now.checked_add_signed(ttl)
                .ok_or(AuthError::ExpiryOutOfRange)?;
        }
        Ok(())
    }

    /// Issue an access token and persist a fresh session
    async fn issue_tokens(
        &self,
        user_id: UserId,
        role: &str,
        device: DeviceInfo,
    ) -> AuthResult<(SessionId, AuthTokens)> {
        let now = Utc::now();
        let refresh_expiry = now
            .checked_add_signed(self.config.refresh_token_ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;

        let (access_token, access_expiry) =
            self.codec
                .issue(user_id, role, self.config.access_token_ttl)?;

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token: generate_refresh_token(),
            expires_at: refresh_expiry,
            revoked_at: None,
            user_agent: device.user_agent,
            ip: device.ip,
            created_at: now,
        };

        self.sessions.create_session(&session).await?;

        Ok((
            session.id,
            AuthTokens {
                access_token,
                access_expiry,
                refresh_token: session.token,
                refresh_expiry,
            },
        ))
    }

    /// Hash on the blocking pool; Argon2 is deliberately slow
    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|_| AuthError::HashingFailed)?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .unwrap_or(false)
    }

    async fn burn_verification(&self, password: &str) {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        let _ = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await;
    }
}

/// Opaque refresh token: 256 bits from the thread-local CSPRNG, hex-encoded
fn generate_refresh_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
