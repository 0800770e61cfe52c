/// Authentication routes
///
/// Register, login, refresh (with rotation), and logout. These handlers are
/// the only writers of refresh token records; per raw token the lifecycle is
/// issued → active → rotated/revoked/expired, and no transition ever returns
/// a token to active.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::{
    decode_token, find_active_refresh_token, generate_access_token, generate_refresh_token,
    hash_password, revoke_all_user_tokens, revoke_refresh_token, save_refresh_token,
    verify_password, Claims, TokenType,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::users::{self, User};
use crate::validators::{is_valid_email, is_valid_full_name, is_valid_username};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair response (refresh endpoint)
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Token pair plus the public account view (register and login)
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Public account view; the password hash is never serialized.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Mint an access+refresh pair for an account and persist the refresh half.
async fn issue_token_pair(
    pool: &PgPool,
    user_id: i64,
    jwt_config: &JwtSettings,
) -> Result<(String, String), AppError> {
    let access_token = generate_access_token(user_id, jwt_config)?;
    let refresh_token = generate_refresh_token(user_id, jwt_config)?;

    save_refresh_token(
        pool,
        user_id,
        &refresh_token,
        jwt_config.refresh_token_expiry,
    )
    .await?;

    Ok((access_token, refresh_token))
}

/// POST /auth/register
///
/// Duplicate email is reported before duplicate username; both are explicit
/// (they aid legitimate registration) unlike the collapsed login errors. The
/// account row is created by a single INSERT with the unique indexes as a
/// backstop, so a losing race leaves no partial write.
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("register");

    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let full_name = match form.full_name.as_deref() {
        Some(name) => Some(is_valid_full_name(name)?),
        None => None,
    };

    if users::find_by_email(pool.get_ref(), &email).await?.is_some() {
        return Err(AppError::Auth(AuthError::DuplicateEmail));
    }

    if users::find_by_username(pool.get_ref(), &username)
        .await?
        .is_some()
    {
        return Err(AppError::Auth(AuthError::DuplicateUsername));
    }

    // Memory-hard hashing runs on the blocking pool, off the request workers.
    let password = form.password.clone();
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("blocking pool failure: {}", e)))??;

    let user = users::insert_user(
        pool.get_ref(),
        &email,
        &username,
        &password_hash,
        full_name.as_deref(),
    )
    .await?;

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), user.id, jwt_config.get_ref()).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "User registered"
    );

    Ok(HttpResponse::Created().json(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
        user: UserResponse::from(&user),
    }))
}

/// POST /auth/login
///
/// Unknown email, wrong password, and inactive account all produce the same
/// `InvalidCredentials` so the endpoint cannot be used to enumerate accounts.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");

    let email = is_valid_email(&form.email)?;

    let user = users::find_by_email(pool.get_ref(), &email)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    let password = form.password.clone();
    let password_hash = user.password_hash.clone();
    let password_valid = web::block(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("blocking pool failure: {}", e)))?;

    if !password_valid {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Login attempt on inactive account");
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), user.id, jwt_config.get_ref()).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user.id,
        "User logged in"
    );

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
        user: UserResponse::from(&user),
    }))
}

/// POST /auth/refresh
///
/// Rotation: the presented token is revoked before the new pair is minted,
/// and the revoke is conditional on the record still being active. When two
/// requests race on the same raw token, at most one passes that gate; the
/// other observes zero affected rows and gets the same `InvalidToken` a
/// never-valid token would get.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("refresh");

    // Signature/expiry check is the fast path before touching storage.
    let claims = decode_token(&form.refresh_token, jwt_config.get_ref()).map_err(|reason| {
        tracing::warn!(reason = %reason, "Refresh token rejected by codec");
        AppError::from(reason)
    })?;

    if claims.token_type != TokenType::Refresh {
        tracing::warn!(
            token_type = %claims.token_type,
            "Non-refresh token presented for rotation"
        );
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    let user_id = claims.user_id()?;

    let record = find_active_refresh_token(pool.get_ref(), &form.refresh_token)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidToken))?;

    // Single-use: revoke-or-lose. A false here means a concurrent request
    // already rotated this token.
    if !revoke_refresh_token(pool.get_ref(), &form.refresh_token).await? {
        tracing::warn!(
            user_id = record.user_id,
            "Refresh token lost rotation race; possible replay"
        );
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    let (access_token, refresh_token) =
        issue_token_pair(pool.get_ref(), user_id, jwt_config.get_ref()).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = user_id,
        "Refresh token rotated"
    );

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    }))
}

/// POST /auth/logout
///
/// Revokes every active refresh token for the authenticated account.
/// Idempotent: a second call finds nothing to revoke and still succeeds.
pub async fn logout(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    revoke_all_user_tokens(pool.get_ref(), user_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
