use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::app::engine::strategy::StrategyRegistry;
use crate::app::engine::timezone;
use crate::app::error::SchedulingError;
use crate::app::events::{EngineEvent, EventBus};
use crate::app::services::{delivery_log_service, user_service};
use crate::app::services::delivery_log_service::ScheduleOutcome;
use crate::database::DbPool;

/// Stats emitted after one daily pre-calc pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecalcStats {
    pub total_eligible: u64,
    pub messages_scheduled: u64,
    pub duplicates_skipped: u64,
    pub errors: u64,
}

/// Runs once per UTC day (plus on startup) over every registered strategy and every active user.
/// Safe to run concurrently from multiple processes: correctness rests on the unique constraint
/// on `idempotency_key`, not on leader election.
pub fn run(pool: &DbPool, registry: &StrategyRegistry, events: &Arc<EventBus>) -> Result<PrecalcStats, SchedulingError> {
    let mut conn = pool.get()?;
    let users = user_service::active_users(&mut conn)?;
    let now = Utc::now();
    let mut stats = PrecalcStats::default();

    for user in &users {
        let tz = match timezone::parse_zone(&user.timezone) {
            Ok(tz) => tz,
            Err(err) => {
                error!(user_id = %user.id, error = %err, "skipping user with invalid timezone");
                stats.errors += 1;
                continue;
            }
        };

        for strategy in registry.all() {
            let event_date = match strategy.event_date(user) {
                Some(date) => date,
                None => continue,
            };

            stats.total_eligible += 1;

            if !timezone::is_event_today(event_date, &tz, now) {
                continue;
            }

            let local_date = now.with_timezone(&tz).date_naive();
            let send_time = strategy.calculate_send_time(local_date, &tz);
            let message = strategy.compose_message(user);

            let outcome = delivery_log_service::schedule(
                &mut conn,
                user.id,
                strategy.event_type(),
                local_date,
                send_time,
                message,
            );

            match outcome {
                Ok(ScheduleOutcome::Inserted(row)) => {
                    stats.messages_scheduled += 1;
                    info!(delivery_log_id = %row.id, user_id = %user.id, event_type = %strategy.event_type(), "scheduled delivery");
                }
                Ok(ScheduleOutcome::DuplicateSkipped) => {
                    stats.duplicates_skipped += 1;
                }
                Err(err) => {
                    error!(user_id = %user.id, event_type = %strategy.event_type(), error = %err, "failed to schedule delivery");
                    stats.errors += 1;
                }
            }
        }
    }

    events.emit(EngineEvent::PrecalcCompleted {
        total_eligible: stats.total_eligible,
        scheduled: stats.messages_scheduled,
        duplicates_skipped: stats.duplicates_skipped,
        errors: stats.errors,
    });

    Ok(stats)
}
