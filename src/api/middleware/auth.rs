use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::SESSION_KEY_USER_ID;
use crate::models::user::{User, UserRole};

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    Forbidden,
    SessionError,
    Database(sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.",
            )
                .into_response(),
            AuthError::Forbidden => {
                (StatusCode::FORBIDDEN, "Insufficient role for this action.").into_response()
            }
            AuthError::SessionError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Database error while resolving session user");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error.").into_response()
            }
        }
    }
}

/// Loads the logged-in user for this session.
///
/// A session pointing at a deleted user counts as unauthenticated.
pub async fn current_user(session: &Session, pool: &PgPool) -> Result<User, AuthError> {
    let user_id: Uuid = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| AuthError::SessionError)?
        .ok_or(AuthError::Unauthorized)?;

    User::find_by_id(pool, user_id)
        .await
        .map_err(AuthError::Database)?
        .ok_or(AuthError::Unauthorized)
}

/// Loads the logged-in user and requires a specific role
pub async fn require_role(
    session: &Session,
    pool: &PgPool,
    role: UserRole,
) -> Result<User, AuthError> {
    let user = current_user(session, pool).await?;

    if user.role != role {
        return Err(AuthError::Forbidden);
    }

    Ok(user)
}
