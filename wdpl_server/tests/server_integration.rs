//! Integration tests for the HTTP server.
//!
//! Drives the full router with `oneshot` over the in-memory stores: status
//! mapping, cookies, validation, request IDs and CORS.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method
use wdpl_auth::auth::{AuthConfig, AuthManager, HasherParams};
use wdpl_auth::db::SessionRepository;
use wdpl_auth::db::memory::{MemorySessionRepository, MemoryUserRepository};
use wdpl_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};

struct TestServer {
    app: axum::Router,
    users: MemoryUserRepository,
    sessions: MemorySessionRepository,
}

/// Helper to create test server over memory stores
fn create_test_server() -> TestServer {
    let users = MemoryUserRepository::new();
    let sessions = MemorySessionRepository::new();
    let config = AuthConfig::new("server-test-secret-at-least-32-bytes!!")
        .with_hasher_params(HasherParams::new(8, 1, 1, None).unwrap());

    let auth_manager = AuthManager::new(
        Arc::new(users.clone()),
        Arc::new(sessions.clone()),
        Arc::new(config),
    );

    TestServer {
        app: create_router(AppState::new(auth_manager, None)),
        users,
        sessions,
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn credentials(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, headers, body)
}

fn set_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .expect("Set-Cookie present")
        .to_str()
        .unwrap()
        .to_string()
}

async fn sign_up(server: &TestServer, email: &str) -> Value {
    let (status, _, body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-up", credentials(email, "password123")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = create_test_server();

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_404_for_invalid_endpoint() {
    let server = create_test_server();

    let request = Request::builder()
        .uri("/api/v1/nonexistent")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Sign-up / Sign-in Tests
// ============================================================================

#[tokio::test]
async fn test_sign_up_returns_tokens_and_cookie() {
    let server = create_test_server();

    let (status, headers, body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-up", credentials("a@x.com", "password123")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["userID"].as_str().is_some());
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["role"], "user");
    assert!(!body["accessToken"].as_str().unwrap().is_empty());

    let refresh_token = body["refreshToken"].as_str().unwrap();
    let cookie = set_cookie(&headers);
    assert!(cookie.starts_with(&format!("refreshToken={};", refresh_token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("Path=/"));

    assert_eq!(server.users.user_count(), 1);
}

#[tokio::test]
async fn test_sign_up_duplicate_email() {
    let server = create_test_server();
    sign_up(&server, "dup@x.com").await;

    let (status, _, body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-up", credentials("dup@x.com", "password123")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user with this email already exists");
    assert_eq!(server.users.user_count(), 1);
}

#[tokio::test]
async fn test_sign_up_validation() {
    let server = create_test_server();

    for payload in [
        credentials("not-an-email", "password123"),
        credentials("a@x.com", "short"),
        credentials("", ""),
    ] {
        let (status, _, body) =
            send(&server.app, json_request("/api/v1/auth/sign-up", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation failed");
    }

    assert_eq!(server.users.user_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_request() {
    let server = create_test_server();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid body");
}

#[tokio::test]
async fn test_sign_in_success() {
    let server = create_test_server();
    let registered = sign_up(&server, "in@x.com").await;

    let (status, headers, body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-in", credentials("in@x.com", "password123")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userID"], registered["userID"]);
    assert_ne!(body["accessToken"], registered["accessToken"]);
    assert_ne!(body["refreshToken"], registered["refreshToken"]);
    assert!(set_cookie(&headers).starts_with("refreshToken="));
}

#[tokio::test]
async fn test_invalid_login_is_uniform() {
    let server = create_test_server();
    sign_up(&server, "known@x.com").await;

    let (wrong_status, _, wrong_body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-in", credentials("known@x.com", "wrongpw")),
    )
    .await;
    let (unknown_status, _, unknown_body) = send(
        &server.app,
        json_request(
            "/api/v1/auth/sign-in",
            credentials("nobody@x.com", "password123"),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "invalid credentials");
}

#[tokio::test]
async fn test_inactive_user_is_forbidden() {
    let server = create_test_server();
    let registered = sign_up(&server, "off@x.com").await;
    let user_id = registered["userID"].as_str().unwrap().parse().unwrap();
    assert!(server.users.set_active(user_id, false));

    let (status, _, body) = send(
        &server.app,
        json_request("/api/v1/auth/sign-in", credentials("off@x.com", "password123")),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "user is inactive");
}

#[tokio::test]
async fn test_sign_in_records_device_metadata() {
    let server = create_test_server();
    sign_up(&server, "device@x.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "server-test/2.0")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Body::from(
            credentials("device@x.com", "password123").to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::OK);

    let session = server
        .sessions
        .get_session_by_token(body["refreshToken"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.user_agent.as_deref(), Some("server-test/2.0"));
    assert_eq!(session.ip.as_deref(), Some("203.0.113.7"));
}

// ============================================================================
// Refresh / Sign-out Tests
// ============================================================================

#[tokio::test]
async fn test_refresh_with_cookie() {
    let server = create_test_server();
    let registered = sign_up(&server, "cookie@x.com").await;
    let refresh_token = registered["refreshToken"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refreshToken={}", refresh_token))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["accessToken"], registered["accessToken"]);
    assert_ne!(body["refreshToken"], registered["refreshToken"]);
    assert!(set_cookie(&headers).starts_with(&format!(
        "refreshToken={};",
        body["refreshToken"].as_str().unwrap()
    )));
}

#[tokio::test]
async fn test_refresh_with_body() {
    let server = create_test_server();
    let registered = sign_up(&server, "body@x.com").await;

    let (status, _, body) = send(
        &server.app,
        json_request(
            "/api/v1/auth/refresh",
            json!({ "refreshToken": registered["refreshToken"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["accessToken"].as_str().is_some());
}

#[tokio::test]
async fn test_refresh_without_token() {
    let server = create_test_server();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&server.app, json_request("/api/v1/auth/refresh", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation failed");
}

#[tokio::test]
async fn test_refresh_with_unknown_token() {
    let server = create_test_server();

    let (status, _, body) = send(
        &server.app,
        json_request("/api/v1/auth/refresh", json!({ "refreshToken": "bogus" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid refresh token");
}

#[tokio::test]
async fn test_sign_out_revokes_and_clears_cookie() {
    let server = create_test_server();
    let registered = sign_up(&server, "out@x.com").await;
    let refresh_token = registered["refreshToken"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/sign-out")
        .header(header::COOKIE, format!("refreshToken={}", refresh_token))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    let cookie = set_cookie(&headers);
    assert!(cookie.starts_with("refreshToken=;"));
    assert!(cookie.contains("Max-Age=0"));

    // Second sign-out is still a success
    let (status, _, _) = send(
        &server.app,
        json_request(
            "/api/v1/auth/sign-out",
            json!({ "refreshToken": refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(
        &server.app,
        json_request(
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh_token }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_unknown_token_is_no_content() {
    let server = create_test_server();

    let (status, _, _) = send(
        &server.app,
        json_request("/api/v1/auth/sign-out", json!({ "refreshToken": "never-issued" })),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ============================================================================
// Protected Route Tests
// ============================================================================

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let server = create_test_server();
    let registered = sign_up(&server, "me@x.com").await;

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", registered["accessToken"].as_str().unwrap()),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userID"], registered["userID"]);
    assert_eq!(body["role"], "user");

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::AUTHORIZATION, "Bearer not.a.token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_outlives_sign_out() {
    let server = create_test_server();
    let registered = sign_up(&server, "stateless@x.com").await;

    send(
        &server.app,
        json_request(
            "/api/v1/auth/sign-out",
            json!({ "refreshToken": registered["refreshToken"] }),
        ),
    )
    .await;

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", registered["accessToken"].as_str().unwrap()),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Middleware Tests
// ============================================================================

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let server = create_test_server();

    let request = Request::builder()
        .uri("/healthz")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&server.app, request).await;
    assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "req-42");

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&server.app, request).await;
    assert!(headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let server = create_test_server();

    let request = Request::builder()
        .uri("/healthz")
        .header("Origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS headers should be present"
    );
}

// ============================================================================
// Concurrent Request Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_sign_ups() {
    let server = create_test_server();

    let mut handles = Vec::new();
    for i in 0..5 {
        let app = server.app.clone();
        handles.push(tokio::spawn(async move {
            let request = json_request(
                "/api/v1/auth/sign-up",
                credentials(&format!("conc{}@x.com", i), "password123"),
            );
            app.oneshot(request).await
        }));
    }

    for handle in handles {
        let response = handle.await.expect("Task should complete").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(server.users.user_count(), 5);
}

#[tokio::test]
async fn test_concurrent_same_email_sign_ups_create_one_user() {
    let server = create_test_server();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let app = server.app.clone();
        handles.push(tokio::spawn(async move {
            let request =
                json_request("/api/v1/auth/sign-up", credentials("same@x.com", "password123"));
            app.oneshot(request).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        let response = handle.await.expect("Task should complete").unwrap();
        match response.status() {
            StatusCode::OK => ok += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(server.users.user_count(), 1);
}
