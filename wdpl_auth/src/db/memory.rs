//! In-memory store implementations.
//!
//! Same contracts as the Postgres stores, including email uniqueness and the
//! conditional revoke, so the orchestrator can be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::errors::{StoreError, StoreResult};
use super::repository::{SessionRepository, UserRepository};
use crate::auth::{Session, SessionId, User, UserId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock cannot leave these maps half-updated.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory `UserRepository`
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a user, bypassing the uniqueness check
    pub fn with_user(self, user: User) -> Self {
        lock(&self.users).insert(user.id, user);
        self
    }

    pub fn user_count(&self) -> usize {
        lock(&self.users).len()
    }

    /// Flip `is_active` on an existing user. Returns `false` if unknown.
    pub fn set_active(&self, user_id: UserId, is_active: bool) -> bool {
        match lock(&self.users).get_mut(&user_id) {
            Some(user) => {
                user.is_active = is_active;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Change the role of an existing user. Returns `false` if unknown.
    pub fn set_role(&self, user_id: UserId, role: &str) -> bool {
        match lock(&self.users).get_mut(&user_id) {
            Some(user) => {
                user.role = role.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut users = lock(&self.users);

        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already exists",
                user.email
            )));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = lock(&self.users);
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(lock(&self.users).get(&user_id).cloned())
    }
}

/// In-memory `SessionRepository`, keyed by token value
#[derive(Clone, Default)]
pub struct MemorySessionRepository {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a session (e.g. one that is already expired)
    pub fn with_session(self, session: Session) -> Self {
        lock(&self.sessions).insert(session.token.clone(), session);
        self
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn sessions_for_user(&self, user_id: UserId) -> Vec<Session> {
        lock(&self.sessions)
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let mut sessions = lock(&self.sessions);

        if sessions.contains_key(&session.token) {
            return Err(StoreError::Conflict("session token already exists".to_string()));
        }

        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_token(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(lock(&self.sessions).get(token).cloned())
    }

    async fn revoke_session(&self, session_id: SessionId) -> StoreResult<bool> {
        let mut sessions = lock(&self.sessions);

        match sessions
            .values_mut()
            .find(|s| s.id == session_id && s.revoked_at.is_none())
        {
            Some(session) => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
