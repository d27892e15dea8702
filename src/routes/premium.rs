use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Identity;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::store::UserStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStatus {
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
}

/// GET /premium/status, behind the premium guard
pub async fn premium_status(
    identity: web::ReqData<Identity>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = users
        .find_by_id(identity.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(PremiumStatus {
        is_premium: user.has_active_premium(Utc::now()),
        premium_expires_at: user.premium_expires_at,
    })))
}
