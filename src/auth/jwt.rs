/// JWT Token Issuer
///
/// Mints and verifies the two token classes. Access and refresh tokens use
/// independent HS256 secrets and lifetimes, so a leaked key of one class
/// cannot forge tokens of the other.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, Identity};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: i64,
}

impl SigningKeys {
    fn new(secret: &str, lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
}

impl TokenIssuer {
    /// `config` is expected to have passed [`JwtSettings::validate`].
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: SigningKeys::new(&config.access_secret, config.access_token_expiry),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_token_expiry),
            issuer: config.issuer.clone(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime in seconds of the given token class
    pub fn lifetime(&self, kind: TokenKind) -> i64 {
        self.keys(kind).lifetime
    }

    pub fn issue_access_token(&self, subject: &Identity) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, subject: &Identity) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Refresh)
    }

    fn issue(&self, subject: &Identity, kind: TokenKind) -> Result<String, AppError> {
        let keys = self.keys(kind);
        let claims = Claims::new(subject, keys.lifetime, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate signature, issuer and expiry against the secret of `kind`.
    ///
    /// # Errors
    /// `TokenExpired` for an expired but otherwise valid token, `TokenInvalid`
    /// for anything malformed, tampered with, or signed with another secret.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(token_kind = ?kind, "JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
                    _ => AppError::Auth(AuthError::TokenInvalid),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use uuid::Uuid;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            access_token_expiry: 3600,
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn subject() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = TokenIssuer::new(&get_test_config());
        let subject = subject();

        let token = issuer.issue_access_token(&subject).expect("Failed to generate token");
        let claims = issuer
            .verify(&token, TokenKind::Access)
            .expect("Failed to validate token");

        assert_eq!(claims.identity().unwrap(), subject);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let issuer = TokenIssuer::new(&get_test_config());
        let subject = subject();

        let access = issuer.issue_access_token(&subject).unwrap();
        let refresh = issuer.issue_refresh_token(&subject).unwrap();

        assert!(issuer.verify(&access, TokenKind::Refresh).is_err());
        assert!(issuer.verify(&refresh, TokenKind::Access).is_err());
        assert!(issuer.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_invalid_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let result = issuer.verify("invalid.token.here", TokenKind::Access);

        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenInvalid))));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let token = issuer.issue_access_token(&subject()).unwrap();

        let tampered = format!("{}X", token);
        assert!(issuer.verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn test_expired_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let mut claims = Claims::new(&subject(), 3600, "test");
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(get_test_config().access_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify(&token, TokenKind::Access),
            Err(AppError::Auth(AuthError::TokenExpired))
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_access_token(&subject())
            .unwrap();

        config.issuer = "wrong-issuer".to_string();
        let result = TokenIssuer::new(&config).verify(&token, TokenKind::Access);

        assert!(result.is_err());
    }

    #[test]
    fn test_consecutive_tokens_differ() {
        let issuer = TokenIssuer::new(&get_test_config());
        let subject = subject();
        assert_ne!(
            issuer.issue_access_token(&subject).unwrap(),
            issuer.issue_access_token(&subject).unwrap()
        );
    }
}
