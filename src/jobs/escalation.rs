use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::models::gate_pass::GatePass;

#[derive(Debug, Default)]
pub struct EscalationStats {
    pub scanned: usize,
    pub escalated: usize,
    pub skipped: usize,
}

/// Background job that escalates stale pending passes to the HOD queue.
///
/// A pass still PENDING after `after_hours` means the mentor never acted on
/// it; moving it to ESCALATED puts it in front of the HOD instead of leaving
/// the student waiting indefinitely.
pub async fn escalate_stale_passes(
    pool: &PgPool,
    after_hours: i64,
    batch_size: i64,
) -> Result<EscalationStats, sqlx::Error> {
    let cutoff = Utc::now() - Duration::hours(after_hours);

    let stale = GatePass::list_stale_pending(pool, cutoff, batch_size).await?;

    let mut stats = EscalationStats {
        scanned: stale.len(),
        ..Default::default()
    };

    for pass in stale {
        match GatePass::escalate(pool, pass.id).await? {
            Some(updated) => {
                tracing::info!(
                    pass_id = %updated.id,
                    student_id = %updated.student_id,
                    applied_at = %updated.applied_at,
                    "Stale pending pass escalated"
                );
                stats.escalated += 1;
            }
            None => {
                // Decided between the select and the update
                stats.skipped += 1;
            }
        }
    }

    if stats.scanned > 0 {
        tracing::info!(?stats, "Escalation job completed");
    }

    Ok(stats)
}
