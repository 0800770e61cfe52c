/// Application Error Handling
///
/// Unified error type for the auth core. Domain-specific sub-enums keep the
/// taxonomy flat for callers while the `ResponseError` impl maps each kind to
/// an HTTP response with a structured JSON body.
///
/// Credential and token failures are deliberately low-information: login and
/// refresh collapse every internal reason (unknown email, wrong password,
/// inactive account, revoked/expired/unknown token) into one message. The
/// internal reason is logged, never returned.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Authentication and account lifecycle errors
///
/// These are the user-visible outcomes of the auth workflow. Everything a
/// caller can distinguish is here; finer-grained reasons stay in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    DuplicateEmail,
    DuplicateUsername,
    InvalidCredentials,
    InvalidToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::DuplicateEmail => write!(f, "email is already registered"),
            AuthError::DuplicateUsername => write!(f, "username is already taken"),
            AuthError::InvalidCredentials => write!(f, "invalid email or password"),
            AuthError::InvalidToken => write!(f, "invalid or expired token"),
        }
    }
}

impl StdError for AuthError {}

/// Internal token rejection reasons
///
/// Produced by token decoding and the type check. Callers log the variant,
/// then convert to the collapsed `AuthError::InvalidToken` before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Malformed,
    WrongType,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::Malformed => write!(f, "token is malformed or has a bad signature"),
            TokenError::WrongType => write!(f, "token type does not match expected use"),
        }
    }
}

impl StdError for TokenError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueViolation(String),
    Unavailable(String),
    Query(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueViolation(constraint) => {
                write!(f, "unique constraint violated: {}", constraint)
            }
            DatabaseError::Unavailable(msg) => write!(f, "storage unavailable: {}", msg),
            DatabaseError::Query(msg) => write!(f, "query failed: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central error type all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Database(DatabaseError),
    /// Broken cryptographic dependency (password hashing or token signing).
    /// Fatal; never masked as an authentication failure.
    Hashing(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Hashing(msg) => write!(f, "hashing failure: {}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

// Collapse at the boundary: callers are expected to have logged the variant.
impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::Auth(AuthError::InvalidToken)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let pg_err = db_err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>();
                // 23505 = unique_violation; the constraint name tells us which
                // uniqueness invariant the storage backstop caught.
                if let Some(pg) = pg_err {
                    if pg.code() == "23505" {
                        let constraint = pg.constraint().unwrap_or_default();
                        if constraint.contains("email") {
                            return AppError::Auth(AuthError::DuplicateEmail);
                        }
                        if constraint.contains("username") {
                            return AppError::Auth(AuthError::DuplicateUsername);
                        }
                        return AppError::Database(DatabaseError::UniqueViolation(
                            constraint.to_string(),
                        ));
                    }
                }
                AppError::Database(DatabaseError::Query(err.to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::Unavailable(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::Query(err.to_string())),
        }
    }
}

/// Error response body returned to HTTP clients
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique id for correlating the response with server logs
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn response_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::DuplicateEmail => {
                    (StatusCode::CONFLICT, "DUPLICATE_EMAIL", e.to_string())
                }
                AuthError::DuplicateUsername => {
                    (StatusCode::CONFLICT, "DUPLICATE_USERNAME", e.to_string())
                }
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password".to_string(),
                ),
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired token".to_string(),
                ),
            },

            AppError::Database(e) => match e {
                DatabaseError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Storage temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Hashing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HASHING_FAILURE",
                "Internal server error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Auth(e) => match e {
                AuthError::DuplicateEmail | AuthError::DuplicateUsername => {
                    tracing::warn!(error_id = error_id, error = %e, "Duplicate registration attempt");
                }
                AuthError::InvalidCredentials => {
                    tracing::warn!(error_id = error_id, "Invalid credentials attempt");
                }
                AuthError::InvalidToken => {
                    tracing::warn!(error_id = error_id, "Token rejected");
                }
            },
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Hashing(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Hashing failure");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let (status, code, message) = self.response_parts();
        let body = ErrorResponse::new(error_id, message, code.to_string(), status.as_u16());

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.response_parts().0
    }
}

/// Per-request context for correlating log lines within a handler
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
        }
    }
}
