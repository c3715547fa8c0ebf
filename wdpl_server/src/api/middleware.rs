//! Authentication middleware for protected endpoints.
//!
//! [`auth_middleware`] runs the authorization gate on the `Authorization:
//! Bearer <token>` header and injects the verified [`AccessClaims`] into the
//! request extensions. [`require_roles`] must be layered inside it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{Router, routing::get, middleware};
//! use wdpl_auth::auth::RoleSet;
//! # use wdpl_server::api::middleware::{auth_middleware, require_roles};
//! # use wdpl_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let admin_routes: Router<AppState> = Router::new()
//!     .route("/admin", get(handler))
//!     .layer(middleware::from_fn_with_state(
//!         Arc::new(RoleSet::new(["admin"])),
//!         require_roles,
//!     ))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
//! # let _ = admin_routes;
//! ```
//!
//! # Extracting Claims
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use wdpl_auth::auth::AccessClaims;
//!
//! async fn protected_handler(Extension(claims): Extension<AccessClaims>) -> String {
//!     format!("Authenticated as user {}", claims.sub)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use wdpl_auth::auth::{AccessClaims, RoleSet, gate};

use super::{AppState, errors::ApiError};
use crate::logging::log_security_event;

/// Authentication middleware that validates JWT tokens and injects claims.
///
/// # Behavior
///
/// - **Success**: Token valid → Injects `AccessClaims` into request extensions → Calls next handler
/// - **Missing header / wrong scheme**: Returns `401 Unauthorized`
/// - **Invalid/expired token**: Returns `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = gate::authenticate(state.auth_manager.codec(), gate::extract_bearer(header))
        .inspect_err(|_| {
            log_security_event("access_denied", None, None, "Missing or invalid bearer token");
        })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Role check for routes behind [`auth_middleware`].
///
/// - **No claims in extensions**: Returns `401 Unauthorized`
/// - **Role not allowed**: Returns `403 Forbidden`
pub async fn require_roles(
    State(allowed): State<Arc<RoleSet>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = request.extensions().get::<AccessClaims>();

    if let Err(e) = gate::authorize(claims, &allowed) {
        let user_id = claims.map(|c| c.sub.to_string());
        log_security_event("forbidden", user_id.as_deref(), None, "Role not allowed");
        return Err(e.into());
    }

    Ok(next.run(request).await)
}
