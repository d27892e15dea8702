use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    hash_token, normalize_email, NewUser, Session, SessionStore, User, UserCounts, UserStore,
};
use crate::error::AppError;

/// Users keyed by id. The write lock spans the email check and the insert,
/// which gives the same guarantee as the unique index in Postgres.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let email_key = normalize_email(&new_user.email);
        if users.values().any(|u| normalize_email(&u.email) == email_key) {
            return Err(AppError::conflict("Email already registered"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email.trim().to_string(),
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: true,
            is_premium: false,
            premium_expires_at: None,
            email_verified: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email_key = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| normalize_email(&u.email) == email_key)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn counts(&self) -> Result<UserCounts, AppError> {
        let users = self.users.read().await;
        let count = |keep: fn(&User) -> bool| users.values().filter(|u| keep(u)).count() as i64;
        Ok(UserCounts {
            total_users: users.len() as i64,
            active_users: count(|u| u.is_active),
            premium_users: count(|u| u.is_premium),
        })
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.is_active = is_active;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn grant_premium(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.is_premium = true;
            user.premium_expires_at = Some(expires_at);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

/// Sessions keyed by token digest
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    fn new_session(user_id: Uuid, token_hash: String, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        let token_hash = hash_token(refresh_token);
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&token_hash) {
            return Err(AppError::conflict("Refresh token already issued"));
        }
        let session = Self::new_session(user_id, token_hash.clone(), expires_at);
        sessions.insert(token_hash, session.clone());
        Ok(session)
    }

    async fn find_by_token(&self, refresh_token: &str) -> Result<Option<Session>, AppError> {
        let token_hash = hash_token(refresh_token);
        Ok(self.sessions.read().await.get(&token_hash).cloned())
    }

    async fn rotate(
        &self,
        user_id: Uuid,
        old_token: &str,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let old_hash = hash_token(old_token);
        let mut sessions = self.sessions.write().await;
        match sessions.get(&old_hash) {
            Some(existing) if existing.user_id == user_id => {}
            _ => return Ok(false),
        }
        sessions.remove(&old_hash);

        let new_hash = hash_token(new_token);
        let session = Self::new_session(user_id, new_hash.clone(), expires_at);
        sessions.insert(new_hash, session);
        Ok(true)
    }

    async fn delete_matching(&self, user_id: Uuid, refresh_token: &str) -> Result<u64, AppError> {
        let token_hash = hash_token(refresh_token);
        let mut sessions = self.sessions.write().await;
        match sessions.get(&token_hash) {
            Some(session) if session.user_id == user_id => {
                sessions.remove(&token_hash);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().filter(|s| s.user_id == user_id).count() as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}
