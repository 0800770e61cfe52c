/// Token issuing and decoding
///
/// One signed encoding scheme for both token kinds; the `type` claim is the
/// only difference. Signing uses the process-wide secret supplied at startup.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

/// Sign a token for `user_id` with an explicit lifetime.
///
/// # Errors
/// Surfaces a fatal hashing failure if the signing primitive reports a fault.
pub fn issue_token(
    user_id: i64,
    token_type: TokenType,
    ttl_seconds: i64,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, token_type, ttl_seconds);

    encode(
        &Header::new(config.algorithm),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Hashing(format!("token signing failed: {}", e)))
}

/// Issue an access token with the configured access TTL.
pub fn generate_access_token(user_id: i64, config: &JwtSettings) -> Result<String, AppError> {
    issue_token(user_id, TokenType::Access, config.access_token_expiry, config)
}

/// Issue a refresh token with the configured refresh TTL.
pub fn generate_refresh_token(user_id: i64, config: &JwtSettings) -> Result<String, AppError> {
    issue_token(user_id, TokenType::Refresh, config.refresh_token_expiry, config)
}

/// Verify signature and expiry, returning the claims.
///
/// The error distinguishes expiry from every other defect (bad signature,
/// corrupt encoding, missing claims) so callers can log the reason; both
/// collapse to the same user-visible outcome. Type checking is the caller's
/// responsibility.
pub fn decode_token(token: &str, config: &JwtSettings) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(config.algorithm);
    // No clock skew allowance: a token past `exp` is expired, full stop.
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            algorithm: Algorithm::HS256,
            access_token_expiry: 1800,
            refresh_token_expiry: 604800,
        }
    }

    #[test]
    fn issue_and_decode_access_token() {
        let config = get_test_config();

        let token = generate_access_token(42, &config).expect("failed to issue token");
        let claims = decode_token(&token, &config).expect("failed to decode token");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn refresh_token_carries_refresh_type_and_ttl() {
        let config = get_test_config();

        let token = generate_refresh_token(42, &config).expect("failed to issue token");
        let claims = decode_token(&token, &config).expect("failed to decode token");

        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn already_expired_token_fails_with_expired() {
        let config = get_test_config();

        let token =
            issue_token(42, TokenType::Access, -1, &config).expect("failed to issue token");
        let result = decode_token(&token, &config);

        assert_eq!(result.unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn garbage_token_fails_with_malformed() {
        let config = get_test_config();

        assert_eq!(
            decode_token("invalid.token.here", &config).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn tampered_token_fails_with_malformed() {
        let config = get_test_config();

        let token = generate_access_token(42, &config).expect("failed to issue token");
        let tampered = format!("{}X", token);

        assert_eq!(
            decode_token(&tampered, &config).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn token_signed_with_other_key_fails_with_malformed() {
        let config = get_test_config();
        let mut other = get_test_config();
        other.secret = "another-secret-key-also-32-characters-xx".to_string();

        let token = generate_access_token(42, &other).expect("failed to issue token");

        assert_eq!(
            decode_token(&token, &config).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn two_tokens_for_same_subject_differ() {
        let config = get_test_config();

        let first = generate_refresh_token(42, &config).expect("failed to issue token");
        let second = generate_refresh_token(42, &config).expect("failed to issue token");

        // jti is unique per token, so the raw values never repeat
        assert_ne!(first, second);
    }
}
