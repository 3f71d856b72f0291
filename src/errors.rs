use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::response::Failure;

pub const NOT_LOGGED_IN: &str = "You are not logged in. Please log in to get access.";
pub const INVALID_TOKEN: &str = "Invalid token. Please log in again.";
pub const USER_GONE: &str = "The user belonging to this token no longer exists.";
pub const ACCOUNT_DEACTIVATED: &str = "User account is deactivated.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action";

/// Every failure that can leave an account operation.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or constraint violation.
    #[error("{0}")]
    Validation(String),

    #[error("Email already exists")]
    DuplicateEmail,

    /// Wrong email or wrong password; the two are never told apart.
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Your account is deactivated. Please contact an admin.")]
    AccountInactive,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountInactive | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Something went wrong. Please try again later.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => error!(error = %format!("{e:#}"), "internal error"),
            AppError::Unauthenticated(_) | AppError::Forbidden(_) | AppError::AccountInactive => {
                info!(error = %self, "access denied")
            }
            _ => debug!(error = %self, "client error"),
        }

        let status = self.status_code();
        (status, Json(Failure::new(self.user_message()))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthenticated(INVALID_TOKEN).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccountInactive.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Forbidden(PERMISSION_DENIED).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("gone".into()).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("10.0.0.3"));
    }
}
