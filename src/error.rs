use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldErrors;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Access forbidden")]
    Forbidden,

    #[error("CSRF token missing")]
    CsrfTokenMissing,

    #[error("CSRF token invalid")]
    CsrfTokenInvalid,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error half of the response envelope
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    error: ErrorBody,
}

impl AppError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::CsrfTokenMissing => "CSRF_TOKEN_MISSING",
            AppError::CsrfTokenInvalid => "CSRF_TOKEN_INVALID",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) | AppError::Json(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) | AppError::Database(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::AccountDisabled
            | AppError::CsrfTokenMissing | AppError::CsrfTokenInvalid => {
                StatusCode::FORBIDDEN
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            AppError::Unauthorized => ("Unauthorized".to_string(), None),
            AppError::InvalidCredentials => ("Invalid username or password".to_string(), None),
            AppError::AccountDisabled => ("Account is disabled".to_string(), None),
            AppError::Forbidden => ("Forbidden".to_string(), None),
            AppError::CsrfTokenMissing => ("CSRF token missing".to_string(), None),
            AppError::CsrfTokenInvalid => ("CSRF token invalid".to_string(), None),
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Conflict(msg) => {
                (msg, None)
            }
            AppError::Validation(fields) => (
                "Validation failed".to_string(),
                serde_json::to_value(fields).ok(),
            ),
            AppError::Json(err) => ("Invalid JSON".to_string(), Some(err.to_string().into())),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal Server Error".to_string(), None)
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                ("Internal Server Error".to_string(), None)
            }
        };

        let body = ErrorEnvelope {
            status: "error",
            error: ErrorBody {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

/// Helper to convert anyhow errors to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
