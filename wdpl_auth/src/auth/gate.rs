//! Authorization gate: turns a bearer credential into verified claims or a rejection.
//!
//! The gate is transport-agnostic. The caller extracts the credential from its own
//! transport (an `Authorization` header, a query parameter, ...), runs
//! [`authenticate`], stores the returned [`AccessClaims`] in its request context,
//! and later runs [`authorize`] against a [`RoleSet`].
//!
//! ```
//! use chrono::Duration;
//! use uuid::Uuid;
//! use wdpl_auth::auth::{GateError, RoleSet, TokenCodec, gate};
//!
//! let codec = TokenCodec::new(b"an-example-signing-secret-of-32-bytes!");
//! let (token, _) = codec.issue(Uuid::new_v4(), "user", Duration::minutes(5)).unwrap();
//!
//! let header = format!("Bearer {}", token);
//! let credential = gate::extract_bearer(Some(header.as_str()));
//! let claims = gate::authenticate(&codec, credential).unwrap();
//!
//! let admins = RoleSet::new(["admin"]);
//! assert_eq!(gate::authorize(Some(&claims), &admins), Err(GateError::Forbidden));
//! assert_eq!(gate::authorize(None, &admins), Err(GateError::Unauthorized));
//! ```

use std::collections::HashSet;

use super::{
    errors::{GateError, GateResult},
    models::AccessClaims,
    tokens::TokenCodec,
};

/// Authentication scheme prefix expected in the `Authorization` header
pub const BEARER_PREFIX: &str = "Bearer ";

/// Pull the credential out of an `Authorization` header value.
///
/// Anything that is not `Bearer <non-empty>` counts as no credential.
pub fn extract_bearer(header_value: Option<&str>) -> Option<&str> {
    header_value
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verify a bearer credential
///
/// # Errors
///
/// * `GateError::Unauthorized` - No credential, or verification failed for any reason
pub fn authenticate(codec: &TokenCodec, credential: Option<&str>) -> GateResult<AccessClaims> {
    let token = credential
        .filter(|token| !token.is_empty())
        .ok_or(GateError::Unauthorized)?;

    codec.verify(token).map_err(|_| GateError::Unauthorized)
}

/// Caller-supplied set of roles allowed through a role check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: HashSet<String>,
}

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Check that previously verified claims carry an allowed role
///
/// Must run after [`authenticate`] populated the claims. Missing claims fail
/// closed as `Unauthorized`, never `Forbidden`.
///
/// # Errors
///
/// * `GateError::Unauthorized` - No claims in the request context
/// * `GateError::Forbidden` - Role not in `allowed`
pub fn authorize<'a>(
    claims: Option<&'a AccessClaims>,
    allowed: &RoleSet,
) -> GateResult<&'a AccessClaims> {
    let claims = claims.ok_or(GateError::Unauthorized)?;

    if allowed.contains(&claims.role) {
        Ok(claims)
    } else {
        Err(GateError::Forbidden)
    }
}
