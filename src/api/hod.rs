use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::require_role;
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::gate_pass::{GatePass, PassStatus};
use crate::models::mentor_assignment::MentorAssignment;
use crate::models::scan_event::ScanEvent;
use crate::models::user::{CreateUserData, User, UserRole};
use crate::services::pass_flow::{self, Decision};
use crate::services::password;

#[derive(Debug, Deserialize)]
pub struct ListPassesParams {
    pub status: Option<PassStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DecisionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub mobile: String,
    pub parent_mobile: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct AssignMentorRequest {
    pub student_id: Uuid,
    pub mentor_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PassTotals {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub escalated: i64,
    pub utilized: i64,
}

#[derive(Debug, Serialize)]
pub struct ScansToday {
    pub exits: i64,
    pub entries: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub passes: PassTotals,
    pub scans_today: ScansToday,
    pub students: i64,
    pub mentors: i64,
}

/// Oversight listing of passes; defaults to the escalated queue
async fn list_passes(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListPassesParams>,
) -> Result<Json<Vec<GatePass>>, AppError> {
    require_role(&session, &state.pool, UserRole::Hod).await?;

    let status = params.status.or(Some(PassStatus::Escalated));
    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let page = params.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let passes = GatePass::list_all(&state.pool, status, per_page, offset).await?;

    Ok(Json(passes))
}

async fn approve(
    State(state): State<AppState>,
    session: Session,
    Path(pass_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<GatePass>, AppError> {
    let hod = require_role(&session, &state.pool, UserRole::Hod).await?;

    let pass = pass_flow::decide(
        &state.pool,
        &hod,
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
    let hod = require_role(&session, &state.pool, UserRole::Hod).await?;

    let pass = pass_flow::decide(
        &state.pool,
        &hod,
        pass_id,
        Decision::Reject { note: req.note },
        state.config.qr_secret.expose_secret().as_bytes(),
    )
    .await?;

    Ok(Json(pass))
}

/// Aggregate numbers for the admin dashboard
async fn reports(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ReportsResponse>, AppError> {
    require_role(&session, &state.pool, UserRole::Hod).await?;

    let mut totals = PassTotals {
        pending: 0,
        approved: 0,
        rejected: 0,
        escalated: 0,
        utilized: 0,
    };
    for row in GatePass::status_counts(&state.pool).await? {
        match row.status {
            PassStatus::Pending => totals.pending = row.count,
            PassStatus::Approved => totals.approved = row.count,
            PassStatus::Rejected => totals.rejected = row.count,
            PassStatus::Escalated => totals.escalated = row.count,
            PassStatus::Utilized => totals.utilized = row.count,
        }
    }

    let scans_today = ScansToday {
        exits: ScanEvent::count_today(&state.pool, "exit").await?,
        entries: ScanEvent::count_today(&state.pool, "entry").await?,
    };

    let students = User::count_by_role(&state.pool, UserRole::Student).await?;
    let mentors = User::count_by_role(&state.pool, UserRole::Mentor).await?;

    Ok(Json(ReportsResponse {
        passes: totals,
        scans_today,
        students,
        mentors,
    }))
}

/// Creates a user of any role (staff onboarding)
async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    require_role(&session, &state.pool, UserRole::Hod).await?;

    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation(
            "A valid email address is required".to_string(),
        ));
    }

    if User::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = password::hash(&req.password)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = User::create(
        &state.pool,
        CreateUserData {
            email,
            name: req.name.trim().to_string(),
            role: req.role,
            mobile: req.mobile.trim().to_string(),
            parent_mobile: req.parent_mobile,
            password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created by HOD");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<Vec<User>>, AppError> {
    require_role(&session, &state.pool, UserRole::Hod).await?;

    let users = User::list(&state.pool, params.role).await?;

    Ok(Json(users))
}

/// Assigns (or reassigns) a mentor to a student
async fn assign_mentor(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<AssignMentorRequest>,
) -> Result<Json<MentorAssignment>, AppError> {
    require_role(&session, &state.pool, UserRole::Hod).await?;

    let student = User::find_by_id(&state.pool, req.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    if student.role != UserRole::Student {
        return Err(AppError::Validation(format!(
            "{} is not a student",
            student.email
        )));
    }

    let mentor = User::find_by_id(&state.pool, req.mentor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Mentor not found".to_string()))?;
    if mentor.role != UserRole::Mentor {
        return Err(AppError::Validation(format!(
            "{} is not a mentor",
            mentor.email
        )));
    }

    let assignment = MentorAssignment::assign(&state.pool, student.id, mentor.id).await?;

    tracing::info!(
        student_id = %student.id,
        mentor_id = %mentor.id,
        "Mentor assigned"
    );

    Ok(Json(assignment))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hod/passes", get(list_passes))
        .route("/hod/passes/:pass_id/approve", post(approve))
        .route("/hod/passes/:pass_id/reject", post(reject))
        .route("/hod/reports", get(reports))
        .route("/hod/users", post(create_user).get(list_users))
        .route("/hod/mentor-assignments", put(assign_mentor))
}
