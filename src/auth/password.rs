/// Password hashing and verification
///
/// Argon2id with a random per-password salt; the PHC output string embeds the
/// algorithm parameters and salt, so verification needs no external state.
/// Hashing is deliberately expensive (memory-hard); callers offload it from
/// the request event loop.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password with Argon2id.
///
/// # Errors
/// Returns a validation error for passwords failing the strength rules, or a
/// fatal `Hashing` error if the primitive itself reports a fault.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Hashing(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored hash.
///
/// Returns `false` for a wrong password and for malformed or foreign hash
/// formats alike; a verification failure must not reveal whether the stored
/// record was usable. The comparison inside the primitive is constant-time.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Strength rules enforced before hashing:
/// 8–128 characters with at least one digit, one lowercase, one uppercase.
fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        )));
    }

    Ok(())
}
