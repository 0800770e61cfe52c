/// JWT claims
///
/// Payload shared by access and refresh tokens (RFC 7519 registered claims
/// plus a `type` discriminator). The codec is type-agnostic: every consumer
/// must check `token_type` against its expected use, because an access token
/// presented where a refresh token belongs (or vice versa) is a privilege
/// confusion, not a formatting problem.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Discriminates the two token kinds sharing one encoding scheme.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: account id in decimal string form
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token id, for audit correlation only
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: i64, token_type: TokenType, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + ttl_seconds,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type,
        }
    }

    /// Extract the account id from the subject claim.
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub.parse::<i64>().map_err(|_| {
            tracing::warn!("Token subject is not a valid account id");
            AppError::Auth(AuthError::InvalidToken)
        })
    }
}
