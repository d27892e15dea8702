/// Session lifecycle: register, login, refresh, logout
///
/// Every successful register/login/refresh ends in a freshly minted token
/// pair whose refresh token is recorded in the session store. Refresh rotates:
/// the presented token's session is consumed by the call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::Identity;
use crate::auth::jwt::{TokenIssuer, TokenKind};
use crate::auth::password::{decoy_hash, hash_password, verify_password};
use crate::error::{AppError, AuthError};
use crate::store::{NewUser, Role, SessionStore, User, UserStore};

/// Validated registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_premium: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_premium: user.is_premium,
        }
    }
}

/// Token pair plus the user it was issued to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserSummary,
}

struct TokenPair {
    access_token: String,
    refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenIssuer,
    hash_cost: u32,
    decoy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenIssuer,
        hash_cost: u32,
    ) -> Result<Self, AppError> {
        let decoy_hash = decoy_hash(hash_cost)?;
        Ok(Self {
            users,
            sessions,
            tokens,
            hash_cost,
            decoy_hash: decoy_hash.into(),
        })
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create an account and log it in.
    ///
    /// # Errors
    /// Conflict when the email is already registered (checked up front and
    /// again by the store's uniqueness guarantee).
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AppError> {
        if self.users.find_by_email(&registration.email).await?.is_some() {
            return Err(AppError::conflict("User with this email already exists"));
        }

        let cost = self.hash_cost;
        let password = registration.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        let user = self
            .users
            .insert(NewUser {
                name: registration.name,
                email: registration.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered successfully");
        self.open_session(&user).await
    }

    /// Exchange credentials for a token pair.
    ///
    /// Unknown email, inactive account and wrong password all fail with the
    /// same `InvalidCredentials` error. Existing sessions are left intact.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let user = self.users.find_by_email(email).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.decoy_hash.to_string(),
        };
        let candidate = password.to_string();
        let password_valid =
            tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
                .await??;

        let user = match user {
            Some(user) if password_valid && user.is_active => user,
            Some(user) => {
                tracing::warn!(user_id = %user.id, "Rejected login attempt");
                return Err(AuthError::InvalidCredentials.into());
            }
            None => {
                tracing::warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        tracing::info!(user_id = %user.id, "User logged in successfully");
        self.open_session(&user).await
    }

    /// Exchange a refresh token for a new token pair, consuming the old one.
    ///
    /// # Errors
    /// `TokenInvalid` / `TokenExpired` when the signature or the stored
    /// session does not check out, the account is gone or inactive, or a
    /// concurrent refresh/logout already consumed the token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let claimed_user = claims.user_id()?;

        let now = Utc::now();
        let session = self
            .sessions
            .find_by_token(refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claimed_user, "Refresh token has no session");
                AppError::Auth(AuthError::TokenInvalid)
            })?;

        // The stored expiry wins over the signed one
        if session.is_expired(now) {
            tracing::info!(user_id = %session.user_id, "Refresh session expired");
            return Err(AuthError::TokenExpired.into());
        }

        if session.user_id != claimed_user {
            tracing::warn!(user_id = %claimed_user, "Refresh token subject mismatch");
            return Err(AuthError::TokenInvalid.into());
        }

        let user = match self.users.find_by_id(session.user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AuthError::TokenInvalid.into()),
        };

        let pair = self.mint_pair(&user)?;
        let rotated = self
            .sessions
            .rotate(user.id, refresh_token, &pair.refresh_token, self.session_expiry(now))
            .await?;
        if !rotated {
            tracing::warn!(user_id = %user.id, "Refresh token already consumed");
            return Err(AuthError::TokenInvalid.into());
        }

        tracing::info!(user_id = %user.id, "Token refreshed successfully");
        Ok(self.build_session(&user, pair))
    }

    /// Revoke one refresh token. Idempotent; access tokens already handed
    /// out stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AppError> {
        let removed = self.sessions.delete_matching(user_id, refresh_token).await?;
        tracing::info!(user_id = %user_id, sessions_removed = removed, "User logged out");
        Ok(())
    }

    async fn open_session(&self, user: &User) -> Result<AuthSession, AppError> {
        let pair = self.mint_pair(user)?;
        self.sessions
            .create(user.id, &pair.refresh_token, self.session_expiry(Utc::now()))
            .await?;
        Ok(self.build_session(user, pair))
    }

    fn mint_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let subject = Identity {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        };
        Ok(TokenPair {
            access_token: self.tokens.issue_access_token(&subject)?,
            refresh_token: self.tokens.issue_refresh_token(&subject)?,
        })
    }

    /// Session rows live exactly as long as the refresh token they hold
    fn session_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.tokens.lifetime(TokenKind::Refresh))
    }

    fn build_session(&self, user: &User, pair: TokenPair) -> AuthSession {
        AuthSession {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            expires_in: self.tokens.lifetime(TokenKind::Access),
            user: UserSummary::from(user),
        }
    }
}
