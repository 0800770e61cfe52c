/// Account repository
///
/// All reads and writes to the `users` table. The unique indexes on email and
/// username are the storage-level backstop for the duplicate checks performed
/// in the handlers; a violation surfaces through the sqlx error conversion.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;

/// A registered account. The password hash never leaves the auth core;
/// handlers expose accounts through a separate public view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, password_hash, full_name, is_active, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, password_hash, full_name, is_active, created_at, updated_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &PgPool, user_id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, password_hash, full_name, is_active, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Create an account. Fails on either uniqueness invariant without leaving a
/// partial row behind (single INSERT).
pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    username: &str,
    password_hash: &str,
    full_name: Option<&str>,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, username, password_hash, full_name)
        VALUES ($1, $2, $3, $4)
        RETURNING id, email, username, password_hash, full_name, is_active, created_at, updated_at
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(full_name)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Partial profile update; absent fields keep their current value.
pub async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    email: Option<&str>,
    username: Option<&str>,
    full_name: Option<&str>,
    password_hash: Option<&str>,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET email = COALESCE($2, email),
            username = COALESCE($3, username),
            full_name = COALESCE($4, full_name),
            password_hash = COALESCE($5, password_hash),
            updated_at = now()
        WHERE id = $1
        RETURNING id, email, username, password_hash, full_name, is_active, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(username)
    .bind(full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Soft delete: the row stays, the account stops authenticating.
pub async fn deactivate_user(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = user_id, "Account deactivated");
    Ok(())
}
