use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::auth::{current_user, AuthError};
use crate::api::middleware::session::{AppState, SESSION_KEY_USER_ID};
use crate::models::user::{CreateUserData, User, UserRole};
use crate::services::password::{self, PasswordError};

#[derive(Debug)]
pub enum AuthApiError {
    AuthError(AuthError),
    DatabaseError(sqlx::Error),
    ValidationError(String),
    EmailTaken,
    InvalidCredentials,
    HashError(String),
    SessionError(String),
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::AuthError(e) => return e.into_response(),
            AuthApiError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database error in auth handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AuthApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::EmailTaken => (
                StatusCode::CONFLICT,
                "An account with this email already exists".to_string(),
            ),
            AuthApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AuthApiError::HashError(msg) => {
                tracing::error!(error = %msg, "Password hashing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthApiError::SessionError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session error: {}", msg),
            ),
        };

        (status, message).into_response()
    }
}

impl From<PasswordError> for AuthApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => AuthApiError::ValidationError(err.to_string()),
            PasswordError::Hash(msg) => AuthApiError::HashError(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub mobile: String,
    pub parent_mobile: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-service signup, always as a student.
///
/// Staff accounts (mentor, security, HOD) are created by the HOD.
async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AuthApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AuthApiError::ValidationError(
            "A valid email address is required".to_string(),
        ));
    }
    if req.name.trim().is_empty() {
        return Err(AuthApiError::ValidationError(
            "Name is required".to_string(),
        ));
    }
    if req.mobile.trim().is_empty() {
        return Err(AuthApiError::ValidationError(
            "Mobile number is required".to_string(),
        ));
    }

    if User::find_by_email(&state.pool, &email)
        .await
        .map_err(AuthApiError::DatabaseError)?
        .is_some()
    {
        return Err(AuthApiError::EmailTaken);
    }

    let password_hash = password::hash(&req.password)?;

    let user = User::create(
        &state.pool,
        CreateUserData {
            email,
            name: req.name.trim().to_string(),
            role: UserRole::Student,
            mobile: req.mobile.trim().to_string(),
            parent_mobile: req.parent_mobile,
            password_hash,
        },
    )
    .await
    .map_err(AuthApiError::DatabaseError)?;

    session
        .insert(SESSION_KEY_USER_ID, user.id)
        .await
        .map_err(|e| AuthApiError::SessionError(e.to_string()))?;

    tracing::info!(user_id = %user.id, "Student registered");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>, AuthApiError> {
    let email = req.email.trim().to_lowercase();

    let user = User::find_by_email(&state.pool, &email)
        .await
        .map_err(AuthApiError::DatabaseError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    if !password::verify(&req.password, &user.password_hash) {
        return Err(AuthApiError::InvalidCredentials);
    }

    session
        .insert(SESSION_KEY_USER_ID, user.id)
        .await
        .map_err(|e| AuthApiError::SessionError(e.to_string()))?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(user))
}

async fn logout(session: Session) -> Result<StatusCode, AuthApiError> {
    session
        .flush()
        .await
        .map_err(|e| AuthApiError::SessionError(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<User>, AuthApiError> {
    let user = current_user(&session, &state.pool)
        .await
        .map_err(AuthApiError::AuthError)?;

    Ok(Json(user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
