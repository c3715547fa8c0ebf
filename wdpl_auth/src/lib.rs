//! # wdpl_auth
//!
//! Credential and session core for the wdpl backend.
//!
//! This library proves identity at login, mints short-lived access tokens,
//! keeps long-lived revocable sessions (refresh tokens), and gates requests
//! by role. Everything around it (HTTP routing, profiles, events) talks to it
//! only to obtain an authenticated identity and through the store contracts
//! in [`db::repository`].
//!
//! ## Architecture
//!
//! Components, leaves first:
//!
//! - **Credential hasher** ([`auth::password`]): Argon2id, fresh salt per hash
//! - **Token codec** ([`auth::tokens`]): HS256 JWT access tokens, algorithm pinned
//! - **Identity / session stores** ([`db::repository`], [`db::memory`]):
//!   Postgres and in-memory implementations of the same traits
//! - **Session orchestrator** ([`auth::AuthManager`]): register, login,
//!   refresh, revoke
//! - **Authorization gate** ([`auth::gate`]): bearer credential to claims,
//!   plus role checks
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use wdpl_auth::auth::{AuthConfig, AuthManager, DeviceInfo};
//! use wdpl_auth::db::memory::{MemorySessionRepository, MemoryUserRepository};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("an-example-signing-secret-of-32-bytes!");
//! let auth = AuthManager::new(
//!     Arc::new(MemoryUserRepository::new()),
//!     Arc::new(MemorySessionRepository::new()),
//!     Arc::new(config),
//! );
//!
//! let (user, tokens) = auth.register("a@x.com", "password123").await?;
//! let claims = auth.verify_access_token(&tokens.access_token)?;
//! assert_eq!(claims.sub, user.id);
//!
//! let (_, again) = auth
//!     .login("a@x.com", "password123", DeviceInfo::default())
//!     .await?;
//! assert_ne!(again.refresh_token, tokens.refresh_token);
//! # Ok(())
//! # }
//! ```

/// Registration, login, token issuance, sessions and the authorization gate.
pub mod auth;

/// Persistence: connection pool, store contracts and their implementations.
pub mod db;

pub use auth::{AccessClaims, AuthConfig, AuthError, AuthManager, AuthResult, AuthTokens, User};
