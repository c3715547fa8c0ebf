//! Error responses for the HTTP boundary.
//!
//! Every failure leaves as `{"error": "<message>"}`. Internal failures are
//! logged with their detail and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use wdpl_auth::auth::{AuthError, GateError};

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An HTTP status paired with a client-safe message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Payload failed validation (400)
    pub fn validation() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation failed")
    }

    /// Generic internal failure (500)
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_internal() {
            tracing::error!(error = %err, "Internal authentication failure");
            return Self::internal();
        }

        let status = match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::UserInactive => StatusCode::FORBIDDEN,
            AuthError::EmailExists => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, err.client_message())
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "unauthorized"),
            GateError::Forbidden => Self::new(StatusCode::FORBIDDEN, "forbidden"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
