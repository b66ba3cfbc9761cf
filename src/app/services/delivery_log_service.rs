use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

use crate::app::error::SchedulingError;
use crate::app::models::{
    delivery_log::idempotency_key, DeliveryLog, DeliveryStatus, DieselUlid, EventType, NewDeliveryLog,
};
use crate::schema::delivery_logs::dsl as dl;

/// Outcome of attempting to schedule a row. Duplicate-key hits are expected on repeat pre-calc
/// runs and are never surfaced as errors.
pub enum ScheduleOutcome {
    Inserted(DeliveryLog),
    DuplicateSkipped,
}

pub fn schedule(
    conn: &mut PgConnection,
    user_id: DieselUlid,
    event_type: EventType,
    local_event_date: NaiveDate,
    scheduled_send_time: DateTime<Utc>,
    message_content: String,
) -> Result<ScheduleOutcome, SchedulingError> {
    let new_row = NewDeliveryLog {
        id: DieselUlid::new(),
        user_id,
        message_type: event_type.as_str().to_string(),
        scheduled_send_time,
        status: DeliveryStatus::Scheduled.as_str().to_string(),
        idempotency_key: idempotency_key(&user_id, event_type, local_event_date),
        message_content,
    };

    let inserted = diesel::insert_into(dl::delivery_logs)
        .values(&new_row)
        .on_conflict(dl::idempotency_key)
        .do_nothing()
        .get_result::<DeliveryLog>(conn)
        .optional()?;

    Ok(match inserted {
        Some(row) => ScheduleOutcome::Inserted(row),
        None => ScheduleOutcome::DuplicateSkipped,
    })
}

pub fn find(conn: &mut PgConnection, id: DieselUlid) -> Result<Option<DeliveryLog>, SchedulingError> {
    Ok(dl::delivery_logs.filter(dl::id.eq(id)).first::<DeliveryLog>(conn).optional()?)
}

/// Claims one SCHEDULED row for the enqueue scheduler. The `WHERE status = 'SCHEDULED'`
/// predicate is the serialization point: exactly one concurrent caller's UPDATE matches.
pub fn claim_for_enqueue(conn: &mut PgConnection, id: DieselUlid) -> Result<Option<DeliveryLog>, SchedulingError> {
    Ok(diesel::update(dl::delivery_logs.filter(dl::id.eq(id)).filter(dl::status.eq(DeliveryStatus::Scheduled.as_str())))
        .set((dl::status.eq(DeliveryStatus::Queued.as_str()), dl::updated_at.eq(Utc::now())))
        .get_result::<DeliveryLog>(conn)
        .optional()?)
}

/// Reverts a row that was optimistically claimed but whose publish was never confirmed, so the
/// next enqueue tick can retry it.
pub fn revert_to_scheduled(conn: &mut PgConnection, id: DieselUlid) -> Result<(), SchedulingError> {
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)).filter(dl::status.eq(DeliveryStatus::Queued.as_str())))
        .set((dl::status.eq(DeliveryStatus::Scheduled.as_str()), dl::updated_at.eq(Utc::now())))
        .execute(conn)?;
    Ok(())
}

pub fn candidates_for_enqueue(
    conn: &mut PgConnection,
    window_end: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<DeliveryLog>, SchedulingError> {
    Ok(dl::delivery_logs
        .filter(dl::status.eq(DeliveryStatus::Scheduled.as_str()))
        .filter(dl::scheduled_send_time.le(window_end))
        .order(dl::scheduled_send_time.asc())
        .limit(limit)
        .load::<DeliveryLog>(conn)?)
}

pub fn mark_sending(conn: &mut PgConnection, id: DieselUlid) -> Result<(), SchedulingError> {
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)))
        .set((dl::status.eq(DeliveryStatus::Sending.as_str()), dl::updated_at.eq(Utc::now())))
        .execute(conn)?;
    Ok(())
}

pub fn mark_sent(conn: &mut PgConnection, id: DieselUlid, provider_message_id: &str) -> Result<(), SchedulingError> {
    let now = Utc::now();
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)))
        .set((
            dl::status.eq(DeliveryStatus::Sent.as_str()),
            dl::actual_send_time.eq(Some(now)),
            dl::api_response_body.eq(Some(provider_message_id.to_string())),
            dl::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_retrying(conn: &mut PgConnection, id: DieselUlid, retry_count: i32, error_message: &str) -> Result<(), SchedulingError> {
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)))
        .set((
            dl::status.eq(DeliveryStatus::Retrying.as_str()),
            dl::retry_count.eq(retry_count),
            dl::error_message.eq(Some(error_message.to_string())),
            dl::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_failed(
    conn: &mut PgConnection,
    id: DieselUlid,
    reason: &str,
    error_message: Option<&str>,
    api_response_code: Option<i32>,
) -> Result<(), SchedulingError> {
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)))
        .set((
            dl::status.eq(DeliveryStatus::Failed.as_str()),
            dl::reason.eq(Some(reason.to_string())),
            dl::error_message.eq(error_message.map(|s| s.to_string())),
            dl::api_response_code.eq(api_response_code),
            dl::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Resets a recovered row back to SCHEDULED with an immediate send time so the next
/// enqueue tick picks it straight up.
pub fn reschedule_immediately(conn: &mut PgConnection, id: DieselUlid) -> Result<(), SchedulingError> {
    let now = Utc::now();
    diesel::update(dl::delivery_logs.filter(dl::id.eq(id)))
        .set((
            dl::status.eq(DeliveryStatus::Scheduled.as_str()),
            dl::scheduled_send_time.eq(now),
            dl::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn stuck_rows(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<DeliveryLog>, SchedulingError> {
    Ok(dl::delivery_logs
        .filter(
            dl::status
                .eq(DeliveryStatus::Queued.as_str())
                .or(dl::status.eq(DeliveryStatus::Sending.as_str()))
                .or(dl::status.eq(DeliveryStatus::Retrying.as_str())),
        )
        .filter(dl::updated_at.le(cutoff))
        .load::<DeliveryLog>(conn)?)
}

pub fn missed_rows(
    conn: &mut PgConnection,
    grace_cutoff: DateTime<Utc>,
) -> Result<Vec<DeliveryLog>, SchedulingError> {
    Ok(dl::delivery_logs
        .filter(dl::status.eq(DeliveryStatus::Scheduled.as_str()))
        .filter(dl::scheduled_send_time.le(grace_cutoff))
        .load::<DeliveryLog>(conn)?)
}
