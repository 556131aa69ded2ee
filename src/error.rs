use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api::middleware::auth::AuthError;
use crate::services::pass_flow::PassFlowError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => AppError::Unauthorized,
            AuthError::Forbidden => AppError::Forbidden,
            AuthError::Database(e) => AppError::Database(e),
            AuthError::SessionError => {
                AppError::Internal(anyhow::anyhow!("session store failure"))
            }
        }
    }
}

impl From<PassFlowError> for AppError {
    fn from(err: PassFlowError) -> Self {
        match err {
            PassFlowError::PassNotFound => AppError::NotFound("Pass not found".to_string()),
            PassFlowError::NotYourStudent => AppError::Forbidden,
            PassFlowError::OpenPassExists => {
                AppError::Conflict("An open pass already exists for this student".to_string())
            }
            PassFlowError::EscalatedNeedsHod => AppError::Forbidden,
            PassFlowError::InvalidTransition { from, action } => AppError::Conflict(format!(
                "Cannot {} a pass in state {}",
                action,
                from.as_str()
            )),
            PassFlowError::Validation(msg) => AppError::Validation(msg),
            PassFlowError::Qr(e) => AppError::Internal(anyhow::Error::new(e)),
            PassFlowError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        let body = Json(json!({
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
