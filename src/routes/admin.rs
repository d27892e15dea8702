/// Admin Routes
///
/// User management behind the access guard plus an ADMIN role check.

use actix_web::{web, HttpResponse};
use chrono::{Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::response::ApiResponse;
use crate::routes::UserProfile;
use crate::store::{SessionStore, UserStore};
use crate::validators::{in_range, FieldErrors};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PREMIUM_MONTHS: i64 = 12;
const MAX_PREMIUM_MONTHS: i64 = 120;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    fn validate(&self) -> Result<(i64, i64), AppError> {
        let mut errors = FieldErrors::default();
        let page = errors.check(in_range("page", self.page, 1, i64::from(i32::MAX)));
        let limit = errors.check(in_range("limit", self.limit, 1, MAX_PAGE_SIZE));

        match (page, limit) {
            (Some(page), Some(limit)) => Ok(((page - 1) * limit, limit)),
            _ => Err(errors.into_error()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Single account as seen by an admin
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub session_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct GrantPremiumRequest {
    #[serde(default = "default_premium_months")]
    pub months: i64,
}

fn default_premium_months() -> i64 {
    DEFAULT_PREMIUM_MONTHS
}

impl Default for GrantPremiumRequest {
    fn default() -> Self {
        Self {
            months: DEFAULT_PREMIUM_MONTHS,
        }
    }
}

impl GrantPremiumRequest {
    /// An empty body means the default grant
    fn parse(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::from(ValidationError::MalformedBody(e.to_string())))
    }

    fn months(&self) -> Result<u32, AppError> {
        let months = in_range("months", self.months, 1, MAX_PREMIUM_MONTHS)?;
        u32::try_from(months).map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn user_not_found() -> AppError {
    AppError::not_found("User not found")
}

/// GET /admin/users?page=&limit=
pub async fn list_users(
    query: web::Query<Pagination>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let (offset, limit) = query.validate()?;
    let page = users.list(offset, limit).await?;
    let counts = users.counts().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(UserPage {
        users: page.into_iter().map(UserProfile::from).collect(),
        total: counts.total_users,
        page: query.page,
        limit,
    })))
}

/// GET /admin/users/{id}
pub async fn get_user(
    path: web::Path<Uuid>,
    users: web::Data<dyn UserStore>,
    sessions: web::Data<dyn SessionStore>,
) -> Result<HttpResponse, AppError> {
    let user = users
        .find_by_id(path.into_inner())
        .await?
        .ok_or_else(user_not_found)?;
    let session_count = sessions.count_for_user(user.id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(AdminUserView {
        profile: UserProfile::from(user),
        session_count,
    })))
}

/// PUT /admin/users/{id}/toggle-status
pub async fn toggle_user_status(
    path: web::Path<Uuid>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let user = users.find_by_id(id).await?.ok_or_else(user_not_found)?;
    let updated = users
        .set_active(id, !user.is_active)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %id, is_active = updated.is_active, "User status updated");
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        UserProfile::from(updated),
        "User status updated",
    )))
}

/// PUT /admin/users/{id}/grant-premium, body `{months?}` (default 12)
pub async fn grant_premium(
    path: web::Path<Uuid>,
    body: web::Bytes,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let months = GrantPremiumRequest::parse(&body)?.months()?;

    let expires_at = Utc::now()
        .checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::Internal("premium expiry out of range".to_string()))?;
    let user = users
        .grant_premium(id, expires_at)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %id, months, "Premium granted");
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        UserProfile::from(user),
        "Premium granted successfully",
    )))
}

/// DELETE /admin/users/{id}
///
/// Sessions go first so a concurrent refresh cannot outlive the account.
pub async fn delete_user(
    path: web::Path<Uuid>,
    users: web::Data<dyn UserStore>,
    sessions: web::Data<dyn SessionStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let revoked = sessions.delete_all_for_user(id).await?;
    if !users.delete(id).await? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, sessions_revoked = revoked, "User deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("User deleted successfully")))
}

/// GET /admin/stats
pub async fn user_stats(users: web::Data<dyn UserStore>) -> Result<HttpResponse, AppError> {
    let counts = users.counts().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(counts)))
}
