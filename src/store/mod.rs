/// Credential and session storage
///
/// `UserStore` owns identity records, `SessionStore` owns issued refresh
/// tokens. Both come in a Postgres flavour for deployments and an in-memory
/// flavour for tests and local runs.

mod memory;
mod postgres;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

pub use memory::{InMemorySessionStore, InMemoryUserStore};
pub use postgres::{PgSessionStore, PgUserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::Internal(format!("Unknown role '{}'", other))),
        }
    }
}

/// Credential record. Deliberately not `Serialize`: the password hash must
/// never leave the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Premium flag set and not yet past its expiry (no expiry = lifetime).
    pub fn has_active_premium(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expires_at.map_or(true, |expires| expires > now)
    }
}

/// Fields required to create a user; everything else takes its default.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Aggregate account figures for the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total_users: i64,
    pub active_users: i64,
    pub premium_users: i64,
}

/// Issued refresh token, stored by digest
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fails with a conflict when the email (case-insensitive) is taken.
    async fn insert(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// One page of users, newest first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError>;
    async fn counts(&self) -> Result<UserCounts, AppError>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>, AppError>;
    async fn grant_premium(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;
    /// Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn create(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError>;
    async fn find_by_token(&self, refresh_token: &str) -> Result<Option<Session>, AppError>;
    /// Atomically replaces `old_token` with `new_token`. Returns false, and
    /// stores nothing, when no row for (`user_id`, `old_token`) exists.
    async fn rotate(
        &self,
        user_id: Uuid,
        old_token: &str,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    /// Idempotent; returns the number of rows removed (0 or 1).
    async fn delete_matching(&self, user_id: Uuid, refresh_token: &str) -> Result<u64, AppError>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
    /// Stored sessions for `user_id`, lapsed ones included until purged.
    async fn count_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Store handles shared by the HTTP layer and the auth service
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::default()),
            sessions: Arc::new(InMemorySessionStore::default()),
        }
    }
}

/// SHA-256 hex digest of a refresh token; only the digest is persisted.
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
