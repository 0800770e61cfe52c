/// Account profile routes
///
/// Read, update, and deactivate the authenticated account. All three sit
/// behind the access-token middleware and re-check that the account still
/// exists and is active: a valid token for a deactivated account opens
/// nothing.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::{hash_password, revoke_all_user_tokens, Claims};
use crate::error::{AppError, AuthError};
use crate::routes::auth::UserResponse;
use crate::users::{self, User};
use crate::validators::{is_valid_email, is_valid_full_name, is_valid_username};

#[derive(serde::Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

async fn load_active_user(pool: &PgPool, claims: &Claims) -> Result<User, AppError> {
    let user_id = claims.user_id()?;

    let user = users::find_by_id(pool, user_id)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidToken))?;

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Token presented for inactive account");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    Ok(user)
}

/// GET /users/me
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(pool.get_ref(), &claims).await?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PUT /users/me
///
/// Partial update. Email and username changes re-run the duplicate checks;
/// a password change re-hashes before anything is written.
pub async fn update_current_user(
    form: web::Json<UpdateUserRequest>,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(pool.get_ref(), &claims).await?;

    let email = match form.email.as_deref() {
        Some(raw) => {
            let email = is_valid_email(raw)?;
            if email != user.email
                && users::find_by_email(pool.get_ref(), &email).await?.is_some()
            {
                return Err(AppError::Auth(AuthError::DuplicateEmail));
            }
            Some(email)
        }
        None => None,
    };

    let username = match form.username.as_deref() {
        Some(raw) => {
            let username = is_valid_username(raw)?;
            if username != user.username
                && users::find_by_username(pool.get_ref(), &username)
                    .await?
                    .is_some()
            {
                return Err(AppError::Auth(AuthError::DuplicateUsername));
            }
            Some(username)
        }
        None => None,
    };

    let full_name = match form.full_name.as_deref() {
        Some(raw) => Some(is_valid_full_name(raw)?),
        None => None,
    };

    let password_hash = match form.password.clone() {
        Some(password) => Some(
            web::block(move || hash_password(&password))
                .await
                .map_err(|e| AppError::Internal(format!("blocking pool failure: {}", e)))??,
        ),
        None => None,
    };

    let updated = users::update_profile(
        pool.get_ref(),
        user.id,
        email.as_deref(),
        username.as_deref(),
        full_name.as_deref(),
        password_hash.as_deref(),
    )
    .await?;

    tracing::info!(user_id = updated.id, "Profile updated");

    Ok(HttpResponse::Ok().json(UserResponse::from(&updated)))
}

/// DELETE /users/me
///
/// Soft delete. Revokes every refresh token, then deactivates the account;
/// both complete before the operation reports success, so a deactivated
/// account never retains an active token.
pub async fn delete_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(pool.get_ref(), &claims).await?;

    revoke_all_user_tokens(pool.get_ref(), user.id).await?;
    users::deactivate_user(pool.get_ref(), user.id).await?;

    Ok(HttpResponse::NoContent().finish())
}
