//! Repository trait definitions for testability and dependency injection.
//!
//! The orchestrator depends only on these traits. Not-found is `Ok(None)`,
//! never an error.
//!
//! The Postgres implementations expect these tables (migrations are owned by
//! the surrounding service):
//!
//! ```sql
//! CREATE TABLE auth.users (
//!     id            UUID PRIMARY KEY,
//!     email         TEXT NOT NULL UNIQUE,
//!     password_hash TEXT NOT NULL,
//!     role          TEXT NOT NULL DEFAULT 'user',
//!     is_active     BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at    TIMESTAMPTZ NOT NULL,
//!     updated_at    TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE auth.refresh_tokens (
//!     id         UUID PRIMARY KEY,
//!     user_id    UUID NOT NULL REFERENCES auth.users(id),
//!     token      TEXT NOT NULL UNIQUE,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     revoked_at TIMESTAMPTZ,
//!     user_agent TEXT,
//!     ip         TEXT,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;

use super::errors::StoreResult;
use super::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
use crate::auth::{Session, SessionId, User, UserId};

/// Identity store: user records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    ///
    /// Fails with `StoreError::Conflict` when the email is already taken.
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    /// Find user by email (exact match as stored)
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Find user by ID
    async fn get_user_by_id(&self, user_id: UserId) -> StoreResult<Option<User>>;
}

/// Session store: refresh token records
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session
    async fn create_session(&self, session: &Session) -> StoreResult<()>;

    /// Find session by its token value, whatever its state
    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<Session>>;

    /// Mark a session revoked if it is not already
    ///
    /// Conditional update: only rows with no `revoked_at` are touched. Returns
    /// `true` when this call performed the revocation, `false` when the session
    /// was already revoked or does not exist.
    async fn revoke_session(&self, session_id: SessionId) -> StoreResult<bool>;
}

/// Default PostgreSQL implementation of `UserRepository`
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

fn user_from_row(r: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: r.try_get("id")?,
        email: r.try_get("email")?,
        password_hash: r.try_get("password_hash")?,
        role: r.try_get("role")?,
        is_active: r.try_get("is_active")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO auth.users (id, email, password_hash, role, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(user.is_active)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, email, password_hash, role, is_active, created_at, updated_at
                 FROM auth.users WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn get_user_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, email, password_hash, role, is_active, created_at, updated_at
                 FROM auth.users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

/// Default PostgreSQL implementation of `SessionRepository`
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

fn session_from_row(r: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        token: r.try_get("token")?,
        expires_at: r.try_get("expires_at")?,
        revoked_at: r.try_get("revoked_at")?,
        user_agent: r.try_get("user_agent")?,
        ip: r.try_get("ip")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO auth.refresh_tokens (id, user_id, token, expires_at, revoked_at, user_agent, ip, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.token)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .bind(&session.user_agent)
            .bind(&session.ip)
            .bind(session.created_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, user_id, token, expires_at, revoked_at, user_agent, ip, created_at
                 FROM auth.refresh_tokens WHERE token = $1",
            )
            .bind(token)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    async fn revoke_session(&self, session_id: SessionId) -> StoreResult<bool> {
        let result = with_timeout(
            self.query_timeout,
            sqlx::query(
                "UPDATE auth.refresh_tokens SET revoked_at = $1
                 WHERE id = $2 AND revoked_at IS NULL",
            )
            .bind(Utc::now())
            .bind(session_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
