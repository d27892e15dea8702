/// JWT Claims structure
///
/// Payload shared by access and refresh tokens: the user's identity plus the
/// standard JWT claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::Role;

/// User a token is minted for; attached to each authenticated request
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique per token, so two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    pub fn new(subject: &Identity, expiry_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: subject.id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A token whose subject is not a UUID is treated as invalid.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }

    pub fn identity(&self) -> Result<Identity, AppError> {
        Ok(Identity {
            id: self.user_id()?,
            email: self.email.clone(),
            role: self.role,
        })
    }
}
