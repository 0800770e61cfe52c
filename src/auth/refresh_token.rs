/// Refresh token store
///
/// Server-side record of every issued refresh token:
/// - Only a SHA-256 digest of the raw token is persisted, never the token.
///   The token is already unguessable by construction; the digest exists for
///   equality lookup, not brute-force resistance.
/// - A record is usable iff unrevoked and unexpired. Revocation is terminal.
/// - `revoke_refresh_token` is a conditional update whose affected-row count
///   serializes concurrent rotation attempts: of two requests presenting the
///   same raw token, at most one observes the record as active.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::AppError;

/// Proof that a refresh token was legitimately issued and is still usable.
/// The lookup digest stays inside this module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persist a newly issued refresh token.
pub async fn save_refresh_token(
    pool: &PgPool,
    user_id: i64,
    token: &str,
    expiry_seconds: i64,
) -> Result<RefreshTokenRecord, AppError> {
    let token_hash = hash_token(token);
    let expires_at = Utc::now() + Duration::seconds(expiry_seconds);

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, expires_at, is_revoked, created_at
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Look up the record for a raw token, returning it only while usable.
///
/// "Never existed", "expired", and "revoked" collapse to `None` so the
/// interface cannot be used as an oracle; the internal reason is logged.
pub async fn find_active_refresh_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<RefreshTokenRecord>, AppError> {
    let token_hash = hash_token(token);

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, expires_at, is_revoked, created_at
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    match record {
        None => {
            tracing::warn!("Refresh token not found in store");
            Ok(None)
        }
        Some(record) if record.is_revoked => {
            tracing::warn!(
                user_id = record.user_id,
                "Attempt to use revoked refresh token"
            );
            Ok(None)
        }
        Some(record) if record.expires_at <= Utc::now() => {
            tracing::info!(user_id = record.user_id, "Refresh token expired");
            Ok(None)
        }
        Some(record) => Ok(Some(record)),
    }
}

/// Mark the record for a raw token revoked.
///
/// Returns whether a record was actually transitioned. The `is_revoked`
/// guard makes the update atomic: a concurrent caller racing on the same
/// token sees zero rows affected.
pub async fn revoke_refresh_token(pool: &PgPool, token: &str) -> Result<bool, AppError> {
    let token_hash = hash_token(token);

    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = TRUE, revoked_at = $1
        WHERE token_hash = $2 AND is_revoked = FALSE
        "#,
    )
    .bind(Utc::now())
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Revoke every active refresh token for an account.
///
/// Used by logout and account deactivation; returns the number revoked, so a
/// second call is a harmless no-op reporting zero.
pub async fn revoke_all_user_tokens(pool: &PgPool, user_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = TRUE, revoked_at = $1
        WHERE user_id = $2 AND is_revoked = FALSE
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    let revoked = result.rows_affected();
    tracing::info!(user_id = user_id, revoked = revoked, "Revoked all refresh tokens");
    Ok(revoked)
}

/// Housekeeping hook: delete records past their expiry.
///
/// The table otherwise grows monotonically; nothing in the auth core calls
/// this on a schedule.
pub async fn prune_expired_tokens(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
