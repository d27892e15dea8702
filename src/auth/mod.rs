/// Authentication module
///
/// Token issuing/verification, password hashing, and the session lifecycle
/// service built on top of them.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::{Claims, Identity};
pub use jwt::{TokenIssuer, TokenKind};
pub use password::{hash_password, verify_password, MAX_PASSWORD_BYTES};
pub use service::{AuthService, AuthSession, Registration, UserSummary};
