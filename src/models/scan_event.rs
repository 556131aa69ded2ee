use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanEvent {
    pub id: Uuid,
    pub pass_id: Option<Uuid>, // nullable: bad payloads may not resolve to a pass
    pub scanned_by: Uuid,
    pub direction: Option<String>, // "exit" or "entry", absent for rejected scans
    pub result: String,
    pub detail: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateScanEventData {
    pub pass_id: Option<Uuid>,
    pub scanned_by: Uuid,
    pub direction: Option<String>,
    pub result: String,
    pub detail: Option<String>,
}

impl ScanEvent {
    /// Records a gate scan, accepted or not
    pub async fn create(pool: &PgPool, data: CreateScanEventData) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO scan_events (pass_id, scanned_by, direction, result, detail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.pass_id)
        .bind(data.scanned_by)
        .bind(&data.direction)
        .bind(&data.result)
        .bind(&data.detail)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    /// Lists recent scans, newest first
    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM scan_events
            ORDER BY scanned_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    /// Counts today's accepted scans in one direction
    pub async fn count_today(pool: &PgPool, direction: &str) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM scan_events
            WHERE result = 'accepted'
              AND direction = $1
              AND scanned_at >= date_trunc('day', NOW())
            "#,
        )
        .bind(direction)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
