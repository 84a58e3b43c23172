//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.
//!
//! Credential failures are deliberately generic: `AuthenticationFailed`
//! never reveals which check failed. `AccountLocked` is distinct so the
//! client can render differentiated messaging, but no unlock time is
//! disclosed. `InvalidToken` and `TokenExpired` are separate because
//! they drive different client behavior (hard failure vs silent
//! re-login).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input or policy violation (with field detail)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Email already registered
    #[error("An account with this email already exists")]
    UserAlreadyExists,

    /// Generic credential failure (wrong email or wrong password)
    #[error("Invalid email or password")]
    AuthenticationFailed,

    /// Account is locked (too many failed attempts)
    #[error("Account is temporarily locked, try again later")]
    AccountLocked,

    /// Token is malformed, unknown, or has been revoked
    #[error("Invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked => StatusCode::LOCKED,
            AuthError::InvalidToken | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::UserAlreadyExists => ErrorKind::Conflict,
            AuthError::AuthenticationFailed
            | AuthError::InvalidToken
            | AuthError::TokenExpired => ErrorKind::Unauthorized,
            AuthError::AccountLocked => ErrorKind::Locked,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::AuthenticationFailed => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::AccountLocked => {
                tracing::warn!("Login attempt on locked account");
            }
            AuthError::InvalidToken => {
                tracing::warn!("Invalid or revoked token presented");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
