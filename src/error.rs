/// Error Handling Module
///
/// One error type for the whole service, built from domain-specific parts:
/// 1. Validation errors (one entry per violated input field)
/// 2. Authentication / authorization errors
/// 3. Storage errors
/// 4. Conversion into the uniform JSON response envelope

use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

use crate::response::ApiResponse;

/// Header carrying the id under which an error was logged.
pub const ERROR_ID_HEADER: &str = "x-error-id";

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for a single input field
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    OutOfRange(String, i64, i64),
    MalformedBody(String),
}

impl ValidationError {
    /// Name of the offending field (`body` for undecodable payloads)
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField(field)
            | ValidationError::TooShort(field, _)
            | ValidationError::TooLong(field, _)
            | ValidationError::InvalidFormat(field)
            | ValidationError::SuspiciousContent(field)
            | ValidationError::OutOfRange(field, _, _) => field,
            ValidationError::MalformedBody(_) => "body",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::OutOfRange(field, min, max) => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            ValidationError::MalformedBody(reason) => write!(f, "malformed request body: {}", reason),
        }
    }
}

impl StdError for ValidationError {}

/// Storage errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Authentication and authorization errors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Unknown email, wrong password and inactive account all collapse here
    InvalidCredentials,
    TokenExpired,
    TokenInvalid,
    MissingToken,
    Forbidden(String),
    PremiumRequired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AuthError::PremiumRequired => write!(f, "An active premium subscription is required"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(Vec<ValidationError>),
    Database(DatabaseError),
    Auth(AuthError),
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::NotFound(what.into()))
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::UniqueConstraintViolation(what.into()))
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => "DUPLICATE_ENTRY",
                DatabaseError::NotFound(_) => "NOT_FOUND",
                DatabaseError::ConnectionPool(_) => "SERVICE_UNAVAILABLE",
                _ => "DATABASE_ERROR",
            },
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                AuthError::TokenExpired | AuthError::TokenInvalid => "TOKEN_INVALID",
                AuthError::MissingToken => "UNAUTHORIZED",
                AuthError::Forbidden(_) => "FORBIDDEN",
                AuthError::PremiumRequired => "PREMIUM_REQUIRED",
            },
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to any caller
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation failed".to_string(),
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(msg) => msg.clone(),
                DatabaseError::NotFound(msg) => msg.clone(),
                DatabaseError::ConnectionPool(_) => {
                    "Database service temporarily unavailable".to_string()
                }
                _ => "Database error occurred".to_string(),
            },
            AppError::Auth(e) => match e {
                AuthError::TokenExpired | AuthError::TokenInvalid => {
                    "Invalid or expired token".to_string()
                }
                other => other.to_string(),
            },
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Underlying detail, only rendered in development mode
    pub(crate) fn internal_detail(&self) -> Option<String> {
        match self {
            AppError::Database(DatabaseError::QueryExecution(msg))
            | AppError::Database(DatabaseError::ConnectionPool(msg))
            | AppError::Database(DatabaseError::UnexpectedError(msg))
            | AppError::Internal(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Render the error envelope.
    ///
    /// `expose_internals` adds storage/internal messages to `error.details`;
    /// validation details are always included.
    pub fn render(&self, error_id: &str, expose_internals: bool) -> HttpResponse {
        let status = self.status_code();
        let details = match self {
            AppError::Validation(errors) => Some(serde_json::json!(errors
                .iter()
                .map(|e| FieldViolation {
                    field: e.field().to_string(),
                    message: e.to_string(),
                })
                .collect::<Vec<_>>())),
            _ if expose_internals => self.internal_detail().map(serde_json::Value::String),
            _ => None,
        };

        let body = ApiResponse::<()>::failure(
            self.public_message(),
            ErrorBody {
                code: self.code().to_string(),
                status_code: status.as_u16(),
                error_id: error_id.to_string(),
                details,
            },
        );

        HttpResponse::build(status)
            .insert_header((ERROR_ID_HEADER, error_id.to_string()))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(body)
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(errors) => {
                tracing::warn!(error_id = error_id, violations = errors.len(), "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
            | AppError::Database(DatabaseError::NotFound(_)) => {
                tracing::info!(error_id = error_id, error = %self, "Request rejected");
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let joined = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "Validation failed: {}", joined)
            }
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(vec![err])
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

/// Unique index on `lower(email)`, see migrations
const USERS_EMAIL_CONSTRAINT: &str = "users_email_lower_idx";

fn unique_violation(constraint: Option<&str>) -> AppError {
    match constraint {
        Some(USERS_EMAIL_CONSTRAINT) => AppError::conflict("User with this email already exists"),
        _ => AppError::conflict("Resource already exists"),
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                let constraint = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.constraint());
                unique_violation(constraint)
            }
            sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(_) => {
                AppError::Database(DatabaseError::QueryExecution(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// `error` object of the response envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub status_code: u16,
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct FieldViolation {
    field: String,
    message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);
        self.render(&error_id, false)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Auth(e) => match e {
                AuthError::Forbidden(_) | AuthError::PremiumRequired => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
