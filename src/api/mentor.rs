use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::require_role;
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::gate_pass::{GatePass, PassStatus};
use crate::models::mentor_assignment::MentorAssignment;
use crate::models::user::{User, UserRole};
use crate::services::pass_flow::{self, Decision};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<PassStatus>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DecisionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Queue of passes filed by this mentor's students
async fn list_passes(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<GatePass>>, AppError> {
    let mentor = require_role(&session, &state.pool, UserRole::Mentor).await?;

    let passes = GatePass::list_for_mentor(&state.pool, mentor.id, params.status).await?;

    Ok(Json(passes))
}

/// Students assigned to this mentor
async fn list_students(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<User>>, AppError> {
    let mentor = require_role(&session, &state.pool, UserRole::Mentor).await?;

    let students = MentorAssignment::list_students(&state.pool, mentor.id).await?;

    Ok(Json(students))
}

async fn approve(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<GatePass>, AppError> {
    let mentor = require_role(&session, &state.pool, UserRole::Mentor).await?;

    let pass = pass_flow::decide(
        &state.pool,
        &mentor,
        pass_id,
        Decision::Approve { note: req.note },
        state.config.qr_secret.expose_secret().as_bytes(),
    )
    .await?;

    Ok(Json(pass))
}

async fn reject(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<GatePass>, AppError> {
    let mentor = require_role(&session, &state.pool, UserRole::Mentor).await?;

    let pass = pass_flow::decide(
        &state.pool,
        &mentor,
        pass_id,
        Decision::Reject { note: req.note },
        state.config.qr_secret.expose_secret().as_bytes(),
    )
    .await?;

    Ok(Json(pass))
}

/// Hands a pending pass over to the HOD queue
async fn escalate(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
) -> Result<Json<GatePass>, AppError> {
    let mentor = require_role(&session, &state.pool, UserRole::Mentor).await?;

    let pass = pass_flow::escalate(&state.pool, &mentor, pass_id).await?;

    Ok(Json(pass))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mentor/passes", get(list_passes))
        .route("/mentor/students", get(list_students))
        .route("/mentor/passes/:pass_id/approve", post(approve))
        .route("/mentor/passes/:pass_id/reject", post(reject))
        .route("/mentor/passes/:pass_id/escalate", post(escalate))
}
