use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::{CredentialError, LoginError, SessionError};
use crate::db::StoreError;
use crate::forum::ForumError;
use crate::reactions::ReactionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    /// No valid session. Rendered as a redirect to the login page.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => {
                return (StatusCode::SEE_OTHER, [(header::LOCATION, "/login")]).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Storage unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable, try again".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        if e.is_transient() {
            AppError::Unavailable(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Store(e) => e.into(),
            e @ SessionError::InvariantViolation { .. } => AppError::Internal(e.to_string()),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound => AppError::NotFound,
            CredentialError::DuplicateEmail | CredentialError::DuplicateUsername => {
                AppError::Conflict(e.to_string())
            }
            CredentialError::Store(e) => e.into(),
        }
    }
}

impl From<LoginError> for AppError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::InvalidCredentials => AppError::Unauthorized,
            LoginError::Credential(e) => e.into(),
            LoginError::Session(e) => e.into(),
        }
    }
}

impl From<ReactionError> for AppError {
    fn from(e: ReactionError) -> Self {
        match e {
            ReactionError::TargetNotFound(_) => AppError::NotFound,
            ReactionError::Store(e) => e.into(),
        }
    }
}

impl From<ForumError> for AppError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::NotFound => AppError::NotFound,
            ForumError::UnknownCategory(_) => AppError::BadRequest(e.to_string()),
            ForumError::Store(e) => e.into(),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
