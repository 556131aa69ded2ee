use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    gate_pass::{CreateGatePassData, GatePass, PassStatus},
    mentor_assignment::MentorAssignment,
    scan_event::{CreateScanEventData, ScanEvent},
    user::{User, UserRole},
};
use crate::services::pass_qr;

#[derive(Error, Debug)]
pub enum PassFlowError {
    #[error("Pass not found")]
    PassNotFound,

    #[error("Student is not assigned to this mentor")]
    NotYourStudent,

    #[error("An open pass already exists for this student")]
    OpenPassExists,

    #[error("Only the HOD can decide an escalated pass")]
    EscalatedNeedsHod,

    #[error("Cannot {action} a pass in state {from}")]
    InvalidTransition {
        from: PassStatus,
        action: &'static str,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("QR generation failed: {0}")]
    Qr(#[from] pass_qr::QrGenerationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct ApplyPassData {
    pub reason: String,
    pub destination: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Decision {
    Approve { note: Option<String> },
    Reject { note: Option<String> },
}

/// Validates an application before it hits the database
fn validate_application(data: &ApplyPassData, now: DateTime<Utc>) -> Result<(), PassFlowError> {
    if data.reason.trim().is_empty() {
        return Err(PassFlowError::Validation("Reason is required".to_string()));
    }
    if data.valid_until <= data.valid_from {
        return Err(PassFlowError::Validation(
            "valid_until must be after valid_from".to_string(),
        ));
    }
    if data.valid_until <= now {
        return Err(PassFlowError::Validation(
            "Pass window is entirely in the past".to_string(),
        ));
    }

    Ok(())
}

/// Which state a decision by this role may act on.
///
/// Mentors decide their students' PENDING passes; the HOD decides both
/// PENDING and ESCALATED ones.
fn decidable_from(role: UserRole, status: PassStatus) -> Result<PassStatus, PassFlowError> {
    match (role, status) {
        (UserRole::Mentor, PassStatus::Pending) => Ok(PassStatus::Pending),
        (UserRole::Mentor, PassStatus::Escalated) => Err(PassFlowError::EscalatedNeedsHod),
        (UserRole::Hod, PassStatus::Pending) => Ok(PassStatus::Pending),
        (UserRole::Hod, PassStatus::Escalated) => Ok(PassStatus::Escalated),
        (_, from) => Err(PassFlowError::InvalidTransition {
            from,
            action: "decide",
        }),
    }
}

/// Files a new pass application for a student
pub async fn apply(
    pool: &PgPool,
    student: &User,
    data: ApplyPassData,
) -> Result<GatePass, PassFlowError> {
    validate_application(&data, Utc::now())?;

    if GatePass::find_open_for_student(pool, student.id)
        .await?
        .is_some()
    {
        return Err(PassFlowError::OpenPassExists);
    }

    let pass = GatePass::create(
        pool,
        CreateGatePassData {
            student_id: student.id,
            reason: data.reason,
            destination: data.destination,
            valid_from: data.valid_from,
            valid_until: data.valid_until,
        },
    )
    .await?;

    tracing::info!(pass_id = %pass.id, student_id = %student.id, "Pass application filed");

    Ok(pass)
}

/// Applies a mentor or HOD decision to a pass
pub async fn decide(
    pool: &PgPool,
    actor: &User,
    pass_id: Uuid,
    decision: Decision,
    qr_key: &[u8],
) -> Result<GatePass, PassFlowError> {
    let pass = GatePass::find_by_id(pool, pass_id)
        .await?
        .ok_or(PassFlowError::PassNotFound)?;

    if actor.role == UserRole::Mentor
        && !MentorAssignment::is_assigned(pool, actor.id, pass.student_id).await?
    {
        return Err(PassFlowError::NotYourStudent);
    }

    let from = decidable_from(actor.role, pass.status)?;

    let updated = match decision {
        Decision::Approve { note } => {
            let token = pass_qr::credential_token(pass.id, pass.valid_until, qr_key);
            GatePass::approve(pool, pass.id, from, actor.id, &token, note).await?
        }
        Decision::Reject { note } => {
            GatePass::reject(pool, pass.id, from, actor.id, note).await?
        }
    };

    // None means the row left `from` between the read and the update
    let updated = updated.ok_or(PassFlowError::InvalidTransition {
        from,
        action: "decide",
    })?;

    tracing::info!(
        pass_id = %updated.id,
        status = %updated.status,
        decided_by = %actor.id,
        "Pass decided"
    );

    Ok(updated)
}

/// Escalates a pending pass to the HOD queue (mentor action)
pub async fn escalate(
    pool: &PgPool,
    actor: &User,
    pass_id: Uuid,
) -> Result<GatePass, PassFlowError> {
    let pass = GatePass::find_by_id(pool, pass_id)
        .await?
        .ok_or(PassFlowError::PassNotFound)?;

    if actor.role == UserRole::Mentor
        && !MentorAssignment::is_assigned(pool, actor.id, pass.student_id).await?
    {
        return Err(PassFlowError::NotYourStudent);
    }

    let updated = GatePass::escalate(pool, pass.id)
        .await?
        .ok_or(PassFlowError::InvalidTransition {
            from: pass.status,
            action: "escalate",
        })?;

    tracing::info!(pass_id = %updated.id, escalated_by = %actor.id, "Pass escalated");

    Ok(updated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Accepted,
    InvalidPayload,
    PassNotFound,
    InvalidToken,
    NotApproved,
    OutsideWindow,
    AlreadyUtilized,
}

impl ScanResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanResult::Accepted => "accepted",
            ScanResult::InvalidPayload => "invalid_payload",
            ScanResult::PassNotFound => "pass_not_found",
            ScanResult::InvalidToken => "invalid_token",
            ScanResult::NotApproved => "not_approved",
            ScanResult::OutsideWindow => "outside_window",
            ScanResult::AlreadyUtilized => "already_utilized",
        }
    }
}

/// Outcome of a gate scan, returned to the scanner UI as JSON
#[derive(Debug, Serialize)]
pub struct ScanVerdict {
    pub result: ScanResult,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<&'static str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<GatePass>,
}

/// Extracts (pass id, token) from the scanned QR payload URL
fn parse_scan_payload(payload: &str) -> Option<(Uuid, String)> {
    let url = url::Url::parse(payload).ok()?;

    let mut pass_id = None;
    let mut token = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "pass" => pass_id = Uuid::parse_str(&value).ok(),
            "token" => token = Some(value.into_owned()),
            _ => {}
        }
    }

    pass_id.zip(token)
}

enum ScanCheck {
    ExitOk,
    EntryOk,
    Rejected(ScanResult),
}

/// Pure validation of a scanned token against the pass row.
///
/// Token verification runs first so that nothing about the pass state leaks
/// to a holder of a forged token.
fn scan_check(pass: &GatePass, token: &str, now: DateTime<Utc>, key: &[u8]) -> ScanCheck {
    if !pass_qr::verify_credential(pass.id, pass.valid_until, token, key) {
        return ScanCheck::Rejected(ScanResult::InvalidToken);
    }

    match pass.status {
        PassStatus::Utilized => return ScanCheck::Rejected(ScanResult::AlreadyUtilized),
        PassStatus::Approved => {}
        _ => return ScanCheck::Rejected(ScanResult::NotApproved),
    }

    if now < pass.valid_from || now > pass.valid_until {
        return ScanCheck::Rejected(ScanResult::OutsideWindow);
    }

    if pass.exit_at.is_none() {
        ScanCheck::ExitOk
    } else if pass.entry_at.is_none() {
        ScanCheck::EntryOk
    } else {
        ScanCheck::Rejected(ScanResult::AlreadyUtilized)
    }
}

async fn record_scan(
    pool: &PgPool,
    security: &User,
    pass_id: Option<Uuid>,
    direction: Option<&'static str>,
    result: ScanResult,
    detail: Option<String>,
) -> Result<(), PassFlowError> {
    ScanEvent::create(
        pool,
        CreateScanEventData {
            pass_id,
            scanned_by: security.id,
            direction: direction.map(str::to_string),
            result: result.as_str().to_string(),
            detail,
        },
    )
    .await?;

    Ok(())
}

/// Validates a scanned QR payload at the gate.
///
/// Every scan is recorded in the audit log, accepted or not. The first
/// accepted scan of an approved pass records the exit, the second records
/// the entry and closes the pass as UTILIZED.
pub async fn process_scan(
    pool: &PgPool,
    security: &User,
    payload: &str,
    qr_key: &[u8],
) -> Result<ScanVerdict, PassFlowError> {
    let Some((pass_id, token)) = parse_scan_payload(payload) else {
        record_scan(
            pool,
            security,
            None,
            None,
            ScanResult::InvalidPayload,
            Some(payload.chars().take(200).collect()),
        )
        .await?;

        return Ok(ScanVerdict {
            result: ScanResult::InvalidPayload,
            accepted: false,
            direction: None,
            message: "Scanned code is not a valid pass QR".to_string(),
            pass: None,
        });
    };

    let Some(pass) = GatePass::find_by_id(pool, pass_id).await? else {
        record_scan(pool, security, None, None, ScanResult::PassNotFound, None).await?;

        return Ok(ScanVerdict {
            result: ScanResult::PassNotFound,
            accepted: false,
            direction: None,
            message: "No pass exists for this QR code".to_string(),
            pass: None,
        });
    };

    match scan_check(&pass, &token, Utc::now(), qr_key) {
        ScanCheck::ExitOk => match GatePass::record_exit(pool, pass.id).await? {
            Some(updated) => {
                record_scan(
                    pool,
                    security,
                    Some(updated.id),
                    Some("exit"),
                    ScanResult::Accepted,
                    None,
                )
                .await?;

                tracing::info!(pass_id = %updated.id, "Exit recorded");

                Ok(ScanVerdict {
                    result: ScanResult::Accepted,
                    accepted: true,
                    direction: Some("exit"),
                    message: "Exit recorded. Scan again at re-entry.".to_string(),
                    pass: Some(updated),
                })
            }
            None => {
                stale_scan(pool, security, pass.id).await
            }
        },
        ScanCheck::EntryOk => match GatePass::record_entry(pool, pass.id).await? {
            Some(updated) => {
                record_scan(
                    pool,
                    security,
                    Some(updated.id),
                    Some("entry"),
                    ScanResult::Accepted,
                    None,
                )
                .await?;

                tracing::info!(pass_id = %updated.id, "Entry recorded, pass utilized");

                Ok(ScanVerdict {
                    result: ScanResult::Accepted,
                    accepted: true,
                    direction: Some("entry"),
                    message: "Entry recorded. Pass is now utilized.".to_string(),
                    pass: Some(updated),
                })
            }
            None => {
                stale_scan(pool, security, pass.id).await
            }
        },
        ScanCheck::Rejected(result) => {
            record_scan(pool, security, Some(pass.id), None, result, None).await?;

            tracing::warn!(pass_id = %pass.id, result = result.as_str(), "Scan rejected");

            let message = match result {
                ScanResult::InvalidToken => "QR token is invalid".to_string(),
                ScanResult::NotApproved => {
                    format!("Pass is not approved (status: {})", pass.status)
                }
                ScanResult::OutsideWindow => "Pass is outside its validity window".to_string(),
                ScanResult::AlreadyUtilized => "Pass has already been utilized".to_string(),
                _ => "Scan rejected".to_string(),
            };

            Ok(ScanVerdict {
                result,
                accepted: false,
                direction: None,
                message,
                pass: Some(pass),
            })
        }
    }
}

/// The pass changed state between the check and the update (two scanners
/// racing on the same code); reject and let security rescan.
async fn stale_scan(
    pool: &PgPool,
    security: &User,
    pass_id: Uuid,
) -> Result<ScanVerdict, PassFlowError> {
    record_scan(
        pool,
        security,
        Some(pass_id),
        None,
        ScanResult::AlreadyUtilized,
        Some("pass state changed during scan".to_string()),
    )
    .await?;

    Ok(ScanVerdict {
        result: ScanResult::AlreadyUtilized,
        accepted: false,
        direction: None,
        message: "Pass state changed, please rescan".to_string(),
        pass: GatePass::find_by_id(pool, pass_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const KEY: &[u8] = b"test-qr-secret";

    fn approved_pass(now: DateTime<Utc>) -> GatePass {
        let id = Uuid::new_v4();
        GatePass {
            id,
            student_id: Uuid::new_v4(),
            reason: "Medical appointment".to_string(),
            destination: Some("City hospital".to_string()),
            applied_at: now - Duration::hours(2),
            valid_from: now - Duration::hours(1),
            valid_until: now + Duration::hours(3),
            status: PassStatus::Approved,
            qr_token: None,
            decided_by: Some(Uuid::new_v4()),
            decided_at: Some(now - Duration::minutes(30)),
            decision_note: None,
            escalated_at: None,
            exit_at: None,
            entry_at: None,
        }
    }

    fn token_for(pass: &GatePass) -> String {
        pass_qr::credential_token(pass.id, pass.valid_until, KEY)
    }

    #[test]
    fn validate_application_rules() {
        let now = Utc::now();
        let good = ApplyPassData {
            reason: "Family function".to_string(),
            destination: None,
            valid_from: now,
            valid_until: now + Duration::hours(4),
        };
        assert!(validate_application(&good, now).is_ok());

        let empty_reason = ApplyPassData {
            reason: "   ".to_string(),
            ..good.clone()
        };
        assert!(matches!(
            validate_application(&empty_reason, now),
            Err(PassFlowError::Validation(_))
        ));

        let inverted = ApplyPassData {
            valid_from: now + Duration::hours(4),
            valid_until: now,
            ..good.clone()
        };
        assert!(validate_application(&inverted, now).is_err());

        let past = ApplyPassData {
            valid_from: now - Duration::hours(8),
            valid_until: now - Duration::hours(4),
            ..good
        };
        assert!(validate_application(&past, now).is_err());
    }

    #[test]
    fn mentor_decides_pending_only() {
        assert!(matches!(
            decidable_from(UserRole::Mentor, PassStatus::Pending),
            Ok(PassStatus::Pending)
        ));
        assert!(matches!(
            decidable_from(UserRole::Mentor, PassStatus::Escalated),
            Err(PassFlowError::EscalatedNeedsHod)
        ));
        assert!(matches!(
            decidable_from(UserRole::Mentor, PassStatus::Rejected),
            Err(PassFlowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn hod_decides_pending_and_escalated() {
        assert!(decidable_from(UserRole::Hod, PassStatus::Pending).is_ok());
        assert!(decidable_from(UserRole::Hod, PassStatus::Escalated).is_ok());
        assert!(decidable_from(UserRole::Hod, PassStatus::Utilized).is_err());
    }

    #[test]
    fn parse_payload_extracts_pass_and_token() {
        let pass_id = Uuid::new_v4();
        let payload = format!(
            "http://localhost:8080/security/validate?pass={}&token=deadbeef",
            pass_id
        );

        let (parsed_id, token) = parse_scan_payload(&payload).unwrap();
        assert_eq!(parsed_id, pass_id);
        assert_eq!(token, "deadbeef");
    }

    #[test]
    fn parse_payload_rejects_garbage() {
        assert!(parse_scan_payload("not a url").is_none());
        assert!(parse_scan_payload("http://localhost/security/validate?pass=xyz").is_none());
        assert!(
            parse_scan_payload("http://localhost/security/validate?token=deadbeef").is_none()
        );
    }

    #[test]
    fn scan_accepts_exit_then_entry() {
        let now = Utc::now();
        let mut pass = approved_pass(now);
        let token = token_for(&pass);

        assert!(matches!(
            scan_check(&pass, &token, now, KEY),
            ScanCheck::ExitOk
        ));

        pass.exit_at = Some(now);
        assert!(matches!(
            scan_check(&pass, &token, now, KEY),
            ScanCheck::EntryOk
        ));
    }

    #[test]
    fn scan_rejects_forged_token() {
        let now = Utc::now();
        let pass = approved_pass(now);
        let forged = pass_qr::credential_token(pass.id, pass.valid_until, b"other-key");

        assert!(matches!(
            scan_check(&pass, &forged, now, KEY),
            ScanCheck::Rejected(ScanResult::InvalidToken)
        ));
    }

    #[test]
    fn scan_rejects_unapproved_pass() {
        let now = Utc::now();
        let mut pass = approved_pass(now);
        pass.status = PassStatus::Pending;
        let token = token_for(&pass);

        assert!(matches!(
            scan_check(&pass, &token, now, KEY),
            ScanCheck::Rejected(ScanResult::NotApproved)
        ));
    }

    #[test]
    fn scan_rejects_outside_window() {
        let now = Utc::now();
        let pass = approved_pass(now);
        let token = token_for(&pass);
        let late = pass.valid_until + Duration::minutes(1);

        assert!(matches!(
            scan_check(&pass, &token, late, KEY),
            ScanCheck::Rejected(ScanResult::OutsideWindow)
        ));
    }

    #[test]
    fn scan_rejects_utilized_pass() {
        let now = Utc::now();
        let mut pass = approved_pass(now);
        pass.status = PassStatus::Utilized;
        pass.exit_at = Some(now - Duration::minutes(20));
        pass.entry_at = Some(now - Duration::minutes(5));
        let token = token_for(&pass);

        assert!(matches!(
            scan_check(&pass, &token, now, KEY),
            ScanCheck::Rejected(ScanResult::AlreadyUtilized)
        ));
    }
}
