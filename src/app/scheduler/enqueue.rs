use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app::broker::{Broker, BrokerMessage};
use crate::app::error::SchedulingError;
use crate::app::events::{EngineEvent, EventBus};
use crate::app::services::delivery_log_service;
use crate::database::DbPool;

/// Batch size per tick; keeps a single run bounded even if a large backlog has accumulated.
const BATCH_LIMIT: i64 = 500;

#[derive(Debug, Default, Clone, Copy)]
pub struct EnqueueStats {
    pub advanced: u64,
    pub publish_failures: u64,
}

/// Moves mature SCHEDULED rows to QUEUED and publishes them. The overlap guard lives in
/// [`EnqueueGuard`]; call sites are expected to skip a tick entirely if `try_acquire` fails.
pub struct EnqueueGuard {
    running: AtomicBool,
}

impl EnqueueGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { running: AtomicBool::new(false) })
    }

    pub fn try_acquire(&self) -> bool {
        self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    pub fn release(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub async fn run(
    pool: &DbPool,
    broker: &dyn Broker,
    window: Duration,
    events: &Arc<EventBus>,
) -> Result<EnqueueStats, SchedulingError> {
    let window_end = Utc::now() + ChronoDuration::from_std(window).unwrap_or(ChronoDuration::hours(1));

    let candidates = {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            delivery_log_service::candidates_for_enqueue(&mut conn, window_end, BATCH_LIMIT)
        })
        .await
        .expect("spawn_blocking panicked")?
    };

    let mut stats = EnqueueStats::default();

    for candidate in candidates {
        let id = candidate.id;
        let claimed = {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                delivery_log_service::claim_for_enqueue(&mut conn, id)
            })
            .await
            .expect("spawn_blocking panicked")?
        };

        let Some(row) = claimed else {
            // Another process already advanced this row past SCHEDULED; nothing to do.
            continue;
        };

        let Some(event_type) = row.event_type() else {
            error!(delivery_log_id = %row.id, "delivery log has unparseable message_type, leaving QUEUED for recovery");
            continue;
        };

        let message = BrokerMessage {
            message_id: row.id,
            user_id: row.user_id,
            message_type: event_type,
            scheduled_send_time: row.scheduled_send_time,
            retry_count: row.retry_count as u32,
            timestamp: Utc::now().timestamp_millis(),
        };

        match broker.publish(&message).await {
            Ok(()) => {
                stats.advanced += 1;
                events.emit(EngineEvent::DeliveryTransitioned {
                    delivery_log_id: row.id,
                    event_type,
                    to: crate::app::models::DeliveryStatus::Queued,
                });
            }
            Err(err) => {
                warn!(delivery_log_id = %row.id, error = %err, "publish unconfirmed, reverting row to SCHEDULED");
                stats.publish_failures += 1;
                let pool = pool.clone();
                let revert = tokio::task::spawn_blocking(move || {
                    let mut conn = pool.get()?;
                    delivery_log_service::revert_to_scheduled(&mut conn, id)
                })
                .await
                .expect("spawn_blocking panicked");
                if let Err(err) = revert {
                    error!(delivery_log_id = %id, error = %err, "failed to revert row after unconfirmed publish");
                }
            }
        }
    }

    info!(advanced = stats.advanced, publish_failures = stats.publish_failures, "enqueue tick complete");
    events.emit(EngineEvent::EnqueueCompleted { advanced: stats.advanced, publish_failures: stats.publish_failures });
    Ok(stats)
}
