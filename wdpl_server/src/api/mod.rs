//! HTTP API for the authentication service.
//!
//! # Modules
//!
//! - [`auth`]: Sign-up, sign-in, refresh, sign-out
//! - [`middleware`]: Bearer authentication and role checks for protected endpoints
//! - [`request_id`]: Request correlation and HTTP metrics
//! - [`errors`]: `{"error": ...}` responses and status mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /healthz                  - Health check (public)
//! POST /api/v1/auth/sign-up      - Register and sign in (public)
//! POST /api/v1/auth/sign-in      - Sign in (public)
//! POST /api/v1/auth/refresh      - New token pair from refresh token (cookie or body)
//! POST /api/v1/auth/sign-out     - Revoke refresh token (cookie or body)
//! GET  /api/v1/auth/me           - Identity behind the bearer token (auth required)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use wdpl_auth::auth::{AuthConfig, AuthManager};
//! use wdpl_auth::db::memory::{MemorySessionRepository, MemoryUserRepository};
//! use wdpl_server::api::{AppState, create_router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth_manager = AuthManager::new(
//!     Arc::new(MemoryUserRepository::new()),
//!     Arc::new(MemorySessionRepository::new()),
//!     Arc::new(AuthConfig::new("an-example-signing-secret-of-32-bytes!")),
//! );
//! let app = create_router(AppState::new(auth_manager, None));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod auth;
pub mod errors;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use wdpl_auth::{auth::AuthManager, db::Database};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; everything inside is behind an `Arc` or a pool handle.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    /// Checked by `/healthz`; `None` when running on in-memory stores
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(auth_manager: AuthManager, database: Option<Database>) -> Self {
        Self {
            auth_manager: Arc::new(auth_manager),
            database,
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .nest("/api/v1", create_v1_router(state.clone()))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    // Public routes (no authentication middleware)
    let public_routes = Router::new()
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/sign-out", post(auth::sign_out));

    // Protected routes (require authentication middleware)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the database answers (or none is configured), or
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:3000/healthz
/// # {"status":"healthy","database":true,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Database health check failed");
                false
            }
        },
        None => true,
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
