/// Input validators
///
/// Field-level checks applied to request bodies before any domain logic runs.
/// Each check returns the normalized value or a [`ValidationError`];
/// [`FieldErrors`] gathers them so a response can report every bad field.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_PASSWORD_BYTES;
use crate::error::{AppError, ValidationError};

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;
const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("email regex is valid");
}

/// Validates an email address, returning it trimmed
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".into()));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".into(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".into()));
    }

    // Local part is limited to 64 octets
    if trimmed.split('@').next().map_or(0, str::len) > 64 {
        return Err(ValidationError::InvalidFormat("email".into()));
    }

    Ok(trimmed.to_string())
}

/// Validates a display name, returning it trimmed
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".into()));
    }

    if length < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort("name".into(), MIN_NAME_LENGTH));
    }

    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".into(), MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("name".into()));
    }

    Ok(trimmed.to_string())
}

/// Validates a new password. Passwords are never trimmed.
pub fn validate_new_password(password: &str) -> Result<String, ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".into()));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password".into(), MIN_PASSWORD_LENGTH));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password".into(), MAX_PASSWORD_BYTES));
    }

    Ok(password.to_string())
}

/// Requires a non-blank value for `field`
pub fn require(field: &str, value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    Ok(value.to_string())
}

/// Requires `value` to lie within `min..=max`
pub fn in_range(field: &str, value: i64, min: i64, max: i64) -> Result<i64, ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange(field.to_string(), min, max));
    }
    Ok(value)
}

/// Collects field errors across several checks
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<ValidationError>);

impl FieldErrors {
    /// Record the error, if any, and hand back the value on success
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.0.push(e);
                None
            }
        }
    }

    pub fn into_error(self) -> AppError {
        AppError::Validation(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("test.email@domain.co.uk").is_ok());
        assert!(validate_email("user+tag@example.com").is_ok());
        assert_eq!(validate_email("  jane@x.com ").unwrap(), "jane@x.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@@example.com").is_err());
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(validate_email(&too_long).is_err());

        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(validate_email(&long_local).is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Jane").is_ok());
        assert!(validate_name("Jean-Pierre").is_ok());
        assert!(validate_name("अर्जुन").is_ok());
        assert!(matches!(validate_name("J"), Err(ValidationError::TooShort(_, 2))));
        assert!(matches!(validate_name("   "), Err(ValidationError::EmptyField(_))));
        assert!(validate_name(&"a".repeat(101)).is_err());
        assert!(validate_name("Name\0with\0null").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_new_password("Password1!").is_ok());
        assert!(validate_new_password("12345678").is_ok());
        assert!(matches!(
            validate_new_password("short"),
            Err(ValidationError::TooShort(_, 8))
        ));
        assert!(validate_new_password(&"a".repeat(73)).is_err());
        assert!(validate_new_password("").is_err());
    }

    #[test]
    fn test_range() {
        assert_eq!(in_range("months", 12, 1, 120).unwrap(), 12);
        assert!(in_range("months", 0, 1, 120).is_err());
        assert!(in_range("months", 121, 1, 120).is_err());
    }

    #[test]
    fn test_field_errors_collects_all() {
        let mut errors = FieldErrors::default();
        let name = errors.check(validate_name("J"));
        let email = errors.check(validate_email("nope"));
        let password = errors.check(validate_new_password("Password1!"));

        assert!(name.is_none());
        assert!(email.is_none());
        assert!(password.is_some());

        match errors.into_error() {
            AppError::Validation(list) => {
                let fields: Vec<&str> = list.iter().map(|e| e.field()).collect();
                assert_eq!(fields, vec!["name", "email"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
