use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::auth::{require_role, AuthError};
use crate::api::middleware::session::AppState;
use crate::models::scan_event::ScanEvent;
use crate::models::user::UserRole;
use crate::services::pass_flow::{self, PassFlowError, ScanVerdict};

#[derive(Debug)]
pub enum SecurityApiError {
    AuthError(AuthError),
    FlowError(PassFlowError),
    DatabaseError(sqlx::Error),
}

impl IntoResponse for SecurityApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SecurityApiError::AuthError(e) => return e.into_response(),
            SecurityApiError::FlowError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Scan processing failed: {}", e),
            ),
            SecurityApiError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database error in security handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// Raw text decoded from the scanned QR code
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanHistoryParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Validates a scanned pass QR at the gate.
///
/// Always responds 200 with a verdict; the scanner UI renders the JSON.
async fn validate(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ScanVerdict>, SecurityApiError> {
    let guard = require_role(&session, &state.pool, UserRole::Security)
        .await
        .map_err(SecurityApiError::AuthError)?;

    let verdict = pass_flow::process_scan(
        &state.pool,
        &guard,
        &req.payload,
        state.config.qr_secret.expose_secret().as_bytes(),
    )
    .await
    .map_err(SecurityApiError::FlowError)?;

    Ok(Json(verdict))
}

/// Recent scan history for the gate console
async fn scan_history(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ScanHistoryParams>,
) -> Result<Json<Vec<ScanEvent>>, SecurityApiError> {
    require_role(&session, &state.pool, UserRole::Security)
        .await
        .map_err(SecurityApiError::AuthError)?;

    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let page = params.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let events = ScanEvent::list_recent(&state.pool, per_page, offset)
        .await
        .map_err(SecurityApiError::DatabaseError)?;

    Ok(Json(events))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/security/validate", post(validate))
        .route("/security/scans", get(scan_history))
}
