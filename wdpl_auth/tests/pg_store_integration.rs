//! Integration tests for the PostgreSQL stores.
//!
//! These need a database with the `auth` schema from `db::repository` and are
//! ignored by default: `DATABASE_URL=... cargo test -- --ignored`.

use argon2::Params;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use wdpl_auth::auth::{AuthConfig, AuthError, AuthManager, DEFAULT_ROLE, DeviceInfo, User};
use wdpl_auth::db::{
    Database, DatabaseConfig, SessionRepository, StoreError, UserRepository,
};

/// Helper to connect to the test database
async fn setup_test_db() -> Database {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/wdpl_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        ..DatabaseConfig::development()
    };

    Database::new(&config)
        .await
        .expect("Failed to create test database")
}

/// Unique email per test run, since rows are not cleaned up
fn unique_email(tag: &str) -> String {
    format!("{}-{}@test.wdpl", tag, Uuid::new_v4())
}

fn new_user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role: DEFAULT_ROLE.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_user_roundtrip_and_unique_email() {
    let db = setup_test_db().await;
    let users = db.user_repository();
    let email = unique_email("unique");

    let user = new_user(&email);
    users.create_user(&user).await.unwrap();

    let found = users.get_user_by_email(&email).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.role, DEFAULT_ROLE);
    assert!(users.get_user_by_id(user.id).await.unwrap().is_some());

    let result = users.create_user(&new_user(&email)).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_conditional_revoke() {
    let db = setup_test_db().await;
    let users = db.user_repository();
    let sessions = db.session_repository();

    let user = new_user(&unique_email("revoke"));
    users.create_user(&user).await.unwrap();

    let now = Utc::now();
    let session = wdpl_auth::auth::Session {
        id: Uuid::new_v4(),
        user_id: user.id,
        token: Uuid::new_v4().simple().to_string(),
        expires_at: now + Duration::minutes(30),
        revoked_at: None,
        user_agent: Some("pg-test".to_string()),
        ip: None,
        created_at: now,
    };
    sessions.create_session(&session).await.unwrap();

    assert!(sessions.revoke_session(session.id).await.unwrap());
    assert!(!sessions.revoke_session(session.id).await.unwrap());

    let stored = sessions
        .get_session_by_token(&session.token)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.revoked_at.is_some());
    assert_eq!(stored.user_agent.as_deref(), Some("pg-test"));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_full_flow_against_postgres() {
    let db = setup_test_db().await;
    let config = AuthConfig::new("pg-integration-secret-at-least-32-bytes")
        .with_hasher_params(Params::new(8, 1, 1, None).unwrap());
    let auth = AuthManager::with_postgres(&db, Arc::new(config));
    let email = unique_email("flow");

    let (user, tokens) = auth.register(&email, "password123").await.unwrap();
    assert!(matches!(
        auth.register(&email, "password123").await,
        Err(AuthError::EmailExists)
    ));

    let (logged_in, _) = auth
        .login(&email, "password123", DeviceInfo::new("pg-test", "127.0.0.1"))
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);

    let refreshed = auth
        .refresh(&tokens.refresh_token, DeviceInfo::default())
        .await
        .unwrap();
    assert_ne!(refreshed.refresh_token, tokens.refresh_token);

    auth.revoke_session(&tokens.refresh_token).await.unwrap();
    auth.revoke_session(&tokens.refresh_token).await.unwrap();
    assert!(matches!(
        auth.refresh(&tokens.refresh_token, DeviceInfo::default()).await,
        Err(AuthError::InvalidCredentials)
    ));

    db.close().await;
}
