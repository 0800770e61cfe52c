/// Input validators for account fields
///
/// Field-shape checks run before any storage or crypto work: length limits,
/// format, and control-character rejection. Email addresses are lowercased
/// here so uniqueness comparisons are case-insensitive everywhere downstream.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 100;
const MAX_FULL_NAME_LENGTH: usize = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap();
}

/// Validates an email address and normalizes it to lowercase.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if trimmed.matches('@').count() != 1 || !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    // Local part longer than 64 octets is invalid per RFC 5321
    if let Some(at_pos) = trimmed.find('@') {
        if trimmed[..at_pos].len() > 64 {
            return Err(ValidationError::InvalidFormat("email".to_string()));
        }
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a username.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort(
            "username".to_string(),
            MIN_USERNAME_LENGTH,
        ));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong(
            "username".to_string(),
            MAX_USERNAME_LENGTH,
        ));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates an optional display name.
pub fn is_valid_full_name(full_name: &str) -> Result<String, ValidationError> {
    let trimmed = full_name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("full_name".to_string()));
    }

    if trimmed.len() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::TooLong(
            "full_name".to_string(),
            MAX_FULL_NAME_LENGTH,
        ));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("full_name".to_string()));
    }

    Ok(trimmed.to_string())
}
