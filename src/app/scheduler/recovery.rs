use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::app::error::SchedulingError;
use crate::app::events::{EngineEvent, EventBus};
use crate::app::models::FailureReason;
use crate::app::services::delivery_log_service;
use crate::database::DbPool;

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryStats {
    pub total_missed: u64,
    pub recovered: u64,
    pub failed: u64,
    pub errors: u64,
}

/// Rescues rows stuck in a transient state and rows that were scheduled but never enqueued.
/// Rows older than `too_late` past their scheduled send instant are marked FAILED with reason
/// `too-late` instead of resurrected.
pub fn run(
    pool: &DbPool,
    max_retries: i32,
    stuck_timeout: Duration,
    precalc_grace: Duration,
    too_late: Duration,
    events: &Arc<EventBus>,
) -> Result<RecoveryStats, SchedulingError> {
    let mut conn = pool.get()?;
    let now = Utc::now();
    let stuck_cutoff = now - ChronoDuration::from_std(stuck_timeout).unwrap_or(ChronoDuration::minutes(15));
    let grace_cutoff = now - ChronoDuration::from_std(precalc_grace).unwrap_or(ChronoDuration::minutes(10));
    let too_late_cutoff = now - ChronoDuration::from_std(too_late).unwrap_or(ChronoDuration::hours(48));

    let mut stats = RecoveryStats::default();

    let mut rows = delivery_log_service::missed_rows(&mut conn, grace_cutoff)?;
    rows.extend(delivery_log_service::stuck_rows(&mut conn, stuck_cutoff)?);
    stats.total_missed = rows.len() as u64;

    for row in rows {
        let result = if row.scheduled_send_time <= too_late_cutoff {
            delivery_log_service::mark_failed(
                &mut conn,
                row.id,
                FailureReason::TooLate.as_str(),
                Some("recovery: past the too-late cutoff"),
                None,
            )
        } else if row.retry_count < max_retries {
            delivery_log_service::reschedule_immediately(&mut conn, row.id)
        } else {
            delivery_log_service::mark_failed(
                &mut conn,
                row.id,
                FailureReason::MaxRetries.as_str(),
                Some("recovery: retry ceiling reached"),
                None,
            )
        };

        match result {
            Ok(()) => {
                if row.scheduled_send_time <= too_late_cutoff || row.retry_count >= max_retries {
                    stats.failed += 1;
                    events.emit(EngineEvent::DeliveryFailed { delivery_log_id: row.id, reason: "recovery".to_string() });
                } else {
                    stats.recovered += 1;
                }
            }
            Err(err) => {
                error!(delivery_log_id = %row.id, error = %err, "recovery failed to update row");
                stats.errors += 1;
            }
        }
    }

    info!(
        total_missed = stats.total_missed,
        recovered = stats.recovered,
        failed = stats.failed,
        errors = stats.errors,
        "recovery tick complete"
    );
    events.emit(EngineEvent::RecoveryCompleted {
        total_missed: stats.total_missed,
        recovered: stats.recovered,
        failed: stats.failed,
        errors: stats.errors,
    });

    Ok(stats)
}
