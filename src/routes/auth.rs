/// Authentication Routes
///
/// Registration, login, token refresh, logout and the current user's profile.
/// Request bodies are checked field by field before the auth service runs;
/// every violated field is reported in one 400 response.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{AuthService, Identity, Registration};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::routes::UserProfile;
use crate::store::UserStore;
use crate::validators::{
    require, validate_email, validate_name, validate_new_password, FieldErrors,
};

/// User registration request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<Registration, AppError> {
        let mut errors = FieldErrors::default();
        let name = errors.check(validate_name(&self.name));
        let email = errors.check(validate_email(&self.email));
        let password = errors.check(validate_new_password(&self.password));

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => Ok(Registration {
                name,
                email,
                password,
            }),
            _ => Err(errors.into_error()),
        }
    }
}

/// User login request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(String, String), AppError> {
        let mut errors = FieldErrors::default();
        let email = errors.check(validate_email(&self.email));
        let password = errors.check(require("password", &self.password));

        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(errors.into_error()),
        }
    }
}

/// Body of `/auth/refresh` and `/auth/logout`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    fn validate(&self) -> Result<String, AppError> {
        require("refreshToken", &self.refresh_token).map_err(AppError::from)
    }
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid name, email or password (all reported together)
/// - 409: email already registered
pub async fn register(
    body: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let registration = body.validate()?;
    let session = auth.register(registration).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(session, "User registered successfully")))
}

/// POST /auth/login
///
/// # Errors
/// - 400: malformed email or missing password
/// - 401: unknown email, wrong password or inactive account (indistinguishable)
pub async fn login(
    body: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let (email, password) = body.validate()?;
    let session = auth.login(&email, &password).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(session, "Login successful")))
}

/// POST /auth/refresh
///
/// The presented refresh token is consumed; the response carries its
/// replacement.
pub async fn refresh(
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = body.validate()?;
    let session = auth.refresh(&refresh_token).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(session, "Token refreshed successfully")))
}

/// POST /auth/logout (access token required)
///
/// Revokes the given refresh token if it belongs to the caller. Always 200.
pub async fn logout(
    identity: web::ReqData<Identity>,
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = body.validate()?;
    auth.logout(identity.id, &refresh_token).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Logout successful")))
}

/// GET /auth/me (access token required)
pub async fn current_user(
    identity: web::ReqData<Identity>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = users
        .find_by_id(identity.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(UserProfile::from(user))))
}
