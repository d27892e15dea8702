mod admin;
mod auth;
mod health_check;
mod premium;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{Role, User};

pub use admin::{delete_user, get_user, grant_premium, list_users, toggle_user_status, user_stats};
pub use auth::{current_user, login, logout, refresh, register};
pub use health_check::health_check;
pub use premium::premium_status;

/// Account as exposed over HTTP (everything but the password hash)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_premium: user.is_premium,
            premium_expires_at: user.premium_expires_at,
            is_active: user.is_active,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fallback for unmatched routes, so 404s use the same envelope
pub async fn not_found() -> Result<actix_web::HttpResponse, AppError> {
    Err(AppError::not_found("Route not found"))
}
