use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pass_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
    Utilized,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Pending => "PENDING",
            PassStatus::Approved => "APPROVED",
            PassStatus::Rejected => "REJECTED",
            PassStatus::Escalated => "ESCALATED",
            PassStatus::Utilized => "UTILIZED",
        }
    }

    /// Open passes block a new application and are the ones staff act on
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PassStatus::Pending | PassStatus::Approved | PassStatus::Escalated
        )
    }
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatePass {
    pub id: Uuid,
    pub student_id: Uuid,
    pub reason: String,
    pub destination: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: PassStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_token: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub exit_at: Option<DateTime<Utc>>,
    pub entry_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateGatePassData {
    pub student_id: Uuid,
    pub reason: String,
    pub destination: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: PassStatus,
    pub count: i64,
}

impl GatePass {
    /// Creates a new pending pass application
    pub async fn create(pool: &PgPool, data: CreateGatePassData) -> Result<Self, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO gate_passes (student_id, reason, destination, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.student_id)
        .bind(&data.reason)
        .bind(&data.destination)
        .bind(data.valid_from)
        .bind(data.valid_until)
        .fetch_one(pool)
        .await?;

        Ok(pass)
    }

    /// Finds a pass by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM gate_passes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Lists a student's passes, newest first
    pub async fn list_by_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let passes = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM gate_passes
            WHERE student_id = $1
            ORDER BY applied_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;

        Ok(passes)
    }

    /// Finds the student's open pass (pending, approved or escalated), if any
    pub async fn find_open_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM gate_passes
            WHERE student_id = $1 AND status IN ('PENDING', 'APPROVED', 'ESCALATED')
            ORDER BY applied_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Lists passes belonging to a mentor's students, optionally filtered by status
    pub async fn list_for_mentor(
        pool: &PgPool,
        mentor_id: Uuid,
        status: Option<PassStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let passes = if let Some(status) = status {
            sqlx::query_as::<_, Self>(
                r#"
                SELECT gp.* FROM gate_passes gp
                JOIN mentor_assignments ma ON ma.student_id = gp.student_id
                WHERE ma.mentor_id = $1 AND gp.status = $2
                ORDER BY gp.applied_at ASC
                "#,
            )
            .bind(mentor_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as::<_, Self>(
                r#"
                SELECT gp.* FROM gate_passes gp
                JOIN mentor_assignments ma ON ma.student_id = gp.student_id
                WHERE ma.mentor_id = $1
                ORDER BY gp.applied_at DESC
                "#,
            )
            .bind(mentor_id)
            .fetch_all(pool)
            .await?
        };

        Ok(passes)
    }

    /// Lists all passes, optionally filtered by status (HOD oversight)
    pub async fn list_all(
        pool: &PgPool,
        status: Option<PassStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let passes = if let Some(status) = status {
            sqlx::query_as::<_, Self>(
                r#"
                SELECT * FROM gate_passes
                WHERE status = $1
                ORDER BY applied_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as::<_, Self>(
                r#"
                SELECT * FROM gate_passes
                ORDER BY applied_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        };

        Ok(passes)
    }

    /// Approves a pass currently in `from` state, storing the QR credential.
    ///
    /// Returns None if the pass is no longer in that state (lost race or
    /// repeated decision).
    pub async fn approve(
        pool: &PgPool,
        id: Uuid,
        from: PassStatus,
        decided_by: Uuid,
        qr_token: &str,
        note: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE gate_passes
            SET
                status = 'APPROVED',
                qr_token = $3,
                decided_by = $4,
                decided_at = NOW(),
                decision_note = $5
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(qr_token)
        .bind(decided_by)
        .bind(note)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Rejects a pass currently in `from` state
    pub async fn reject(
        pool: &PgPool,
        id: Uuid,
        from: PassStatus,
        decided_by: Uuid,
        note: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE gate_passes
            SET
                status = 'REJECTED',
                decided_by = $3,
                decided_at = NOW(),
                decision_note = $4
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(decided_by)
        .bind(note)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Escalates a pending pass to the HOD queue
    pub async fn escalate(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE gate_passes
            SET status = 'ESCALATED', escalated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Records the exit scan on an approved pass
    pub async fn record_exit(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE gate_passes
            SET exit_at = NOW()
            WHERE id = $1 AND status = 'APPROVED' AND exit_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Records the entry scan and closes the pass
    pub async fn record_entry(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE gate_passes
            SET entry_at = NOW(), status = 'UTILIZED'
            WHERE id = $1
              AND status = 'APPROVED'
              AND exit_at IS NOT NULL
              AND entry_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Counts passes grouped by status
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM gate_passes
            GROUP BY status
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }

    /// Pending passes applied before the cutoff, oldest first
    pub async fn list_stale_pending(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let passes = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM gate_passes
            WHERE status = 'PENDING' AND applied_at < $1
            ORDER BY applied_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_statuses() {
        assert!(PassStatus::Pending.is_open());
        assert!(PassStatus::Approved.is_open());
        assert!(PassStatus::Escalated.is_open());
        assert!(!PassStatus::Rejected.is_open());
        assert!(!PassStatus::Utilized.is_open());
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&PassStatus::Escalated).unwrap();
        assert_eq!(json, "\"ESCALATED\"");

        let status: PassStatus = serde_json::from_str("\"UTILIZED\"").unwrap();
        assert_eq!(status, PassStatus::Utilized);
    }
}
