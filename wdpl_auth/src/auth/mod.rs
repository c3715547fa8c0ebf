//! Authentication module providing registration, login, and session management.
//!
//! This module implements:
//! - Argon2id password hashing with a fresh salt per call
//! - HS256 JWT access tokens (15-minute default expiry)
//! - Store-backed refresh sessions (30-minute default expiry) with idempotent revocation
//! - A transport-agnostic authorization gate with role allow-sets
//!
//! Access tokens are stateless. Revoking a session does not invalidate access
//! tokens already issued under it; they stay valid until their own expiry, which
//! is why the access TTL is kept short.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wdpl_auth::auth::{AuthConfig, AuthManager, DeviceInfo};
//! use wdpl_auth::db::{Database, DatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let auth = AuthManager::with_postgres(
//!         &db,
//!         Arc::new(AuthConfig::new(std::env::var("JWT_SECRET")?)),
//!     );
//!
//!     let device = DeviceInfo::new("curl/8.0", "127.0.0.1");
//!     let (user, tokens) = auth.login("a@x.com", "password123", device).await?;
//!     println!("Logged in {} until {}", user.email, tokens.access_expiry);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod gate;
pub mod manager;
pub mod models;
pub mod password;
pub mod tokens;

pub use config::{AuthConfig, HasherParams, RefreshPolicy};
pub use errors::{AuthError, AuthResult, GateError, GateResult};
pub use gate::RoleSet;
pub use manager::AuthManager;
pub use models::{
    AccessClaims, AuthTokens, DEFAULT_ROLE, DeviceInfo, Session, SessionId, SessionState, User,
    UserId,
};
pub use password::CredentialHasher;
pub use tokens::TokenCodec;
