/// Password Hashing and Verification
///
/// Salted bcrypt hashes; bcrypt's verifier compares digests in constant time.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// bcrypt ignores input past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Plaintext behind the decoy hash checked for unknown emails
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// Hash a password with a fresh random salt
///
/// # Errors
/// Returns error if bcrypt rejects the cost or fails internally
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// Input longer than [`MAX_PASSWORD_BYTES`] never matches: bcrypt would
/// compare only its prefix. The digest is still computed so the cost of a
/// failed check does not depend on the input length.
///
/// # Errors
/// Returns error if the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let matched = verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
    Ok(matched && password.len() <= MAX_PASSWORD_BYTES)
}

/// Hash verified against when a login names an unknown email, so a failed
/// login costs the same whether or not the account exists.
pub fn decoy_hash(cost: u32) -> Result<String, AppError> {
    hash_password(DECOY_PASSWORD, cost)
}
