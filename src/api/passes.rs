use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::require_role;
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::gate_pass::{GatePass, PassStatus};
use crate::models::user::UserRole;
use crate::services::{pass_flow, pass_qr};

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub reason: String,
    pub destination: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PassQrResponse {
    pub pass_id: Uuid,
    pub payload_url: String,
    pub qrcode_svg: String,
    pub qrcode_image: String, // base64 PNG
    pub valid_until: DateTime<Utc>,
}

/// Files a new pass application for the logged-in student
async fn apply(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<GatePass>), AppError> {
    let student = require_role(&session, &state.pool, UserRole::Student).await?;

    let pass = pass_flow::apply(
        &state.pool,
        &student,
        pass_flow::ApplyPassData {
            reason: req.reason,
            destination: req.destination,
            valid_from: req.valid_from,
            valid_until: req.valid_until,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(pass)))
}

/// Lists the logged-in student's passes
async fn list_own(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<GatePass>>, AppError> {
    let student = require_role(&session, &state.pool, UserRole::Student).await?;

    let passes = GatePass::list_by_student(&state.pool, student.id).await?;

    Ok(Json(passes))
}

/// Loads one of the student's own passes.
///
/// Passes belonging to other students read as not found.
async fn find_own(
    pool: &sqlx::PgPool,
    student_id: Uuid,
    pass_id: Uuid,
) -> Result<GatePass, AppError> {
    let pass = GatePass::find_by_id(pool, pass_id)
        .await?
        .filter(|p| p.student_id == student_id)
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    Ok(pass)
}

async fn get_pass(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
) -> Result<Json<GatePass>, AppError> {
    let student = require_role(&session, &state.pool, UserRole::Student).await?;

    let pass = find_own(&state.pool, student.id, pass_id).await?;

    Ok(Json(pass))
}

/// Returns the QR credential bundle for an approved pass
async fn get_pass_qr(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
) -> Result<Json<PassQrResponse>, AppError> {
    let student = require_role(&session, &state.pool, UserRole::Student).await?;

    let pass = find_own(&state.pool, student.id, pass_id).await?;

    if pass.status != PassStatus::Approved {
        return Err(AppError::Conflict(format!(
            "Pass is not approved (status: {})",
            pass.status
        )));
    }

    let token = pass
        .qr_token
        .as_deref()
        .ok_or_else(|| AppError::Conflict("Pass has no QR credential".to_string()))?;

    // Sanity check against the stored token; a mismatch means the QR secret
    // was rotated after approval and the pass must be re-approved.
    let key = state.config.qr_secret.expose_secret().as_bytes();
    if !pass_qr::verify_credential(pass.id, pass.valid_until, token, key) {
        return Err(AppError::Conflict(
            "QR credential is no longer valid, ask for re-approval".to_string(),
        ));
    }

    let payload_url = pass_qr::payload_url(&state.config.base_url, pass.id, token);
    let qrcode_svg = pass_qr::generate_qr_svg(&payload_url).map_err(anyhow::Error::new)?;
    let qrcode_png = pass_qr::generate_qr_png(&payload_url).map_err(anyhow::Error::new)?;

    Ok(Json(PassQrResponse {
        pass_id: pass.id,
        payload_url,
        qrcode_svg,
        qrcode_image: BASE64.encode(qrcode_png),
        valid_until: pass.valid_until,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/passes", post(apply).get(list_own))
        .route("/passes/:pass_id", get(get_pass))
        .route("/passes/:pass_id/qr", get(get_pass_qr))
}
