//! Authentication API handlers.
//!
//! - Sign-up with email and password (auto sign-in)
//! - Sign-in, recording user agent and client IP on the new session
//! - Refresh, reading the refresh token from the `refreshToken` cookie or the body
//! - Sign-out, revoking the session and clearing the cookie
//!
//! The refresh token is handed out both in the JSON body and as an HTTP-only
//! cookie, so browser clients never need to keep it in script-visible storage.
//!
//! # Examples
//!
//! Sign up:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/auth/sign-up \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "a@x.com", "password": "password123"}'
//! ```
//!
//! Refresh using the cookie jar:
//! ```bash
//! curl -X POST http://localhost:3000/api/v1/auth/refresh -b cookies.txt -c cookies.txt
//! ```

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts, State, rejection::JsonRejection},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, SET_COOKIE, USER_AGENT},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, future::Future, net::SocketAddr, time::Duration};
use uuid::Uuid;
use wdpl_auth::auth::{AccessClaims, AuthError, AuthResult, DeviceInfo};

use super::{AppState, errors::ApiError};
use crate::{logging::log_security_event, metrics};

/// Name of the HTTP-only cookie carrying the refresh token
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Deadline for the store work behind a single request
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignUpPayload {
    pub email: String,
    pub password: String,
}

impl SignUpPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if is_valid_email(&self.email) && self.password.chars().count() >= MIN_PASSWORD_LEN {
            Ok(())
        } else {
            Err(ApiError::validation())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInPayload {
    pub email: String,
    pub password: String,
}

impl SignInPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if is_valid_email(&self.email) && !self.password.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation())
        }
    }
}

/// Body accepted by refresh and sign-out when no cookie is sent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Caller metadata recorded on new sessions
///
/// The IP comes from the peer address when the server runs with connect info,
/// otherwise from the first `x-forwarded-for` entry.
#[derive(Debug, Clone, Default)]
pub struct ClientDevice(pub DeviceInfo);

impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .or_else(|| {
                parts
                    .headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(|v| v.trim().to_string())
            })
            .unwrap_or_default();

        Ok(ClientDevice(DeviceInfo::new(user_agent, &ip)))
    }
}

/// Register a new user account and sign them in.
///
/// # Request Body
///
/// ```json
/// { "email": "a@x.com", "password": "password123" }
/// ```
///
/// # Response
///
/// `200 OK` with [`AuthResponse`] and a `refreshToken` cookie.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, invalid email, short password, or email taken
/// - `500 Internal Server Error`: Store or hashing failure
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|_| invalid_body())?;
    payload.validate()?;

    let result = with_deadline(state.auth_manager.register(&payload.email, &payload.password)).await;
    record_outcome("sign_up", &result);
    let (user, tokens) = result?;

    let cookie = refresh_cookie(&tokens.refresh_token, tokens.refresh_expiry);
    let body = AuthResponse {
        user_id: user.id,
        email: user.email,
        role: user.role,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };

    Ok(with_cookie(Json(body), cookie))
}

/// Authenticate a user and open a new session.
///
/// # Request Body
///
/// ```json
/// { "email": "a@x.com", "password": "password123" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body or failed validation
/// - `401 Unauthorized`: Unknown email or wrong password
/// - `403 Forbidden`: Account deactivated
pub async fn sign_in(
    State(state): State<AppState>,
    ClientDevice(device): ClientDevice,
    payload: Result<Json<SignInPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|_| invalid_body())?;
    payload.validate()?;

    let ip = device.ip.clone();
    let result = with_deadline(
        state
            .auth_manager
            .login(&payload.email, &payload.password, device),
    )
    .await;
    record_outcome("sign_in", &result);

    let (user, tokens) = result.inspect_err(|e| {
        if !e.is_internal() {
            log_security_event("failed_login", None, ip.as_deref(), &e.to_string());
        }
    })?;

    let cookie = refresh_cookie(&tokens.refresh_token, tokens.refresh_expiry);
    let body = AuthResponse {
        user_id: user.id,
        email: user.email,
        role: user.role,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };

    Ok(with_cookie(Json(body), cookie))
}

/// Mint a new token pair from a refresh token.
///
/// The token is read from the `refreshToken` cookie, falling back to
/// `{"refreshToken": "..."}` in the body.
///
/// # Errors
///
/// - `400 Bad Request`: No cookie and no usable body
/// - `401 Unauthorized`: Unknown, expired or revoked refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ClientDevice(device): ClientDevice,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let refresh_token = refresh_token_from(&headers, &body)?;

    let ip = device.ip.clone();
    let result = with_deadline(state.auth_manager.refresh(&refresh_token, device)).await;
    record_outcome("refresh", &result);

    let tokens = result.map_err(|e| match e {
        AuthError::InvalidCredentials => {
            log_security_event("invalid_refresh", None, ip.as_deref(), "Refresh rejected");
            ApiError::new(StatusCode::UNAUTHORIZED, "invalid refresh token")
        }
        other => other.into(),
    })?;

    let cookie = refresh_cookie(&tokens.refresh_token, tokens.refresh_expiry);
    let body = RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };

    Ok(with_cookie(Json(body), cookie))
}

/// Revoke the session behind a refresh token and clear the cookie.
///
/// Unknown or already revoked tokens still answer `204 No Content`. Access
/// tokens issued under the session stay valid until they expire.
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let refresh_token = refresh_token_from(&headers, &body)?;

    let result = with_deadline(state.auth_manager.revoke_session(&refresh_token)).await;
    record_outcome("sign_out", &result);
    result?;

    Ok(with_cookie(StatusCode::NO_CONTENT, cleared_refresh_cookie()))
}

/// Identity behind the bearer token (requires auth middleware)
pub async fn me(Extension(claims): Extension<AccessClaims>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.sub,
        expires_at: claims.expires_at(),
        role: claims.role,
    })
}

fn invalid_body() -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "invalid body")
}

/// Run a core operation under [`HANDLER_TIMEOUT`]
async fn with_deadline<T, F>(future: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(HANDLER_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Store(wdpl_auth::db::StoreError::Timeout(
            HANDLER_TIMEOUT,
        ))),
    }
}

fn record_outcome<T>(operation: &'static str, result: &AuthResult<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(AuthError::InvalidCredentials) => "invalid_credentials",
        Err(AuthError::UserInactive) => "user_inactive",
        Err(AuthError::EmailExists) => "email_exists",
        Err(_) => "error",
    };
    metrics::auth_attempts_total(operation, outcome);
}

/// Loose shape check: one `@` with non-empty local part and a dotted domain
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn refresh_token_from(headers: &HeaderMap, body: &Bytes) -> Result<String, ApiError> {
    if let Some(token) = cookie_value(headers, REFRESH_COOKIE_NAME) {
        return Ok(token.to_string());
    }

    let payload: RefreshPayload = serde_json::from_slice(body).map_err(|_| invalid_body())?;
    if payload.refresh_token.is_empty() {
        return Err(ApiError::validation());
    }

    Ok(payload.refresh_token)
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn refresh_cookie(token: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; Path=/; Expires={}; HttpOnly; Secure",
        REFRESH_COOKIE_NAME,
        token,
        http_date(expires_at)
    )
}

fn cleared_refresh_cookie() -> String {
    format!(
        "{}=; Path=/; Expires={}; Max-Age=0; HttpOnly; Secure",
        REFRESH_COOKIE_NAME,
        http_date(Utc::now() - chrono::Duration::hours(1))
    )
}

fn with_cookie(response: impl IntoResponse, cookie: String) -> Response {
    let mut response = response.into_response();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refresh cookie is not a valid header value"),
    }
    response
}
