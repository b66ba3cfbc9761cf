use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::broker::{Consumer, Delivery};
use crate::app::events::{EngineEvent, EventBus};
use crate::app::models::{DeliveryStatus, FailureReason};
use crate::app::send_client::{SendClient, SendError};
use crate::app::services::{delivery_log_service, user_service};
use crate::database::DbPool;

/// Consumes deliveries and drives each through the worker algorithm: re-read for idempotency,
/// check for a soft-deleted user, invoke the send client, then classify the result into
/// SENT / RETRYING / FAILED.
pub struct Worker {
    pool: DbPool,
    send_client: Arc<dyn SendClient>,
    max_retries: i32,
    events: Arc<EventBus>,
}

impl Worker {
    pub fn new(pool: DbPool, send_client: Arc<dyn SendClient>, max_retries: i32, events: Arc<EventBus>) -> Self {
        Self { pool, send_client, max_retries, events }
    }

    /// Runs until the consumer stream ends or `shutdown` fires. On shutdown, stops accepting
    /// new deliveries but lets in-flight ones finish — the drain deadline itself is enforced by
    /// the caller.
    pub async fn run(&self, mut consumer: Box<dyn Consumer>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("worker shutting down, no longer accepting new deliveries");
                        break;
                    }
                }
                delivery = consumer.recv() => {
                    match delivery {
                        Some(delivery) => self.handle(delivery).await,
                        None => {
                            warn!("broker consumer stream ended");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, delivery: Delivery) {
        let message = delivery.message.clone();
        let pool = self.pool.clone();
        let row = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            delivery_log_service::find(&mut conn, message.message_id)
        })
        .await
        .expect("spawn_blocking panicked");

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => {
                error!(delivery_log_id = %delivery.message.message_id, "delivery log row vanished, rejecting to DLQ");
                let _ = delivery.reject_to_dlq().await;
                return;
            }
            Err(err) => {
                error!(delivery_log_id = %delivery.message.message_id, error = %err, "failed to re-read delivery log, nacking for redelivery");
                let _ = delivery.nack_requeue(message.retry_count).await;
                return;
            }
        };

        // Already terminal: another worker or a retried redelivery already sent this one.
        if row.status().as_ref() == Some(&DeliveryStatus::Sent) {
            let _ = delivery.ack().await;
            return;
        }

        let user_id = row.user_id;
        let pool = self.pool.clone();
        let user = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            user_service::find(&mut conn, user_id)
        })
        .await
        .expect("spawn_blocking panicked");

        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) | Err(_) => {
                self.fail(row.id, FailureReason::UserDeleted, Some("user record not found")).await;
                let _ = delivery.ack().await;
                return;
            }
        };

        if !user.is_active() {
            self.fail(row.id, FailureReason::UserDeleted, Some("user is soft-deleted")).await;
            let _ = delivery.ack().await;
            return;
        }

        self.mark_sending(row.id).await;

        match self.send_client.send(&user.email, &row.message_content).await {
            Ok(outcome) => {
                self.mark_sent(row.id, &outcome.provider_message_id).await;
                self.events.emit(EngineEvent::DeliverySent { delivery_log_id: row.id });
                let _ = delivery.ack().await;
            }
            Err(err) => self.handle_send_error(delivery, row.id, row.retry_count, err).await,
        }
    }

    async fn handle_send_error(&self, delivery: Delivery, delivery_log_id: crate::app::models::DieselUlid, retry_count: i32, err: SendError) {
        if !err.is_transient() {
            let code = match &err {
                SendError::Status { code, .. } => Some(*code as i32),
                _ => None,
            };
            self.fail_with_code(delivery_log_id, FailureReason::Permanent4xx, Some(&err.to_string()), code).await;
            let _ = delivery.reject_to_dlq().await;
            return;
        }

        if retry_count < self.max_retries {
            let next_retry_count = retry_count + 1;
            self.mark_retrying(delivery_log_id, next_retry_count, &err.to_string()).await;
            let _ = delivery.nack_requeue(next_retry_count as u32).await;
        } else {
            self.fail(delivery_log_id, FailureReason::MaxRetries, Some(&err.to_string())).await;
            let _ = delivery.reject_to_dlq().await;
        }
    }

    async fn mark_sending(&self, id: crate::app::models::DieselUlid) {
        self.run_db(move |conn| delivery_log_service::mark_sending(conn, id)).await;
    }

    async fn mark_sent(&self, id: crate::app::models::DieselUlid, provider_message_id: &str) {
        let provider_message_id = provider_message_id.to_string();
        self.run_db(move |conn| delivery_log_service::mark_sent(conn, id, &provider_message_id)).await;
    }

    async fn mark_retrying(&self, id: crate::app::models::DieselUlid, retry_count: i32, error_message: &str) {
        let error_message = error_message.to_string();
        self.run_db(move |conn| delivery_log_service::mark_retrying(conn, id, retry_count, &error_message)).await;
    }

    async fn fail(&self, id: crate::app::models::DieselUlid, reason: FailureReason, error_message: Option<&str>) {
        self.fail_with_code(id, reason, error_message, None).await;
    }

    async fn fail_with_code(
        &self,
        id: crate::app::models::DieselUlid,
        reason: FailureReason,
        error_message: Option<&str>,
        api_response_code: Option<i32>,
    ) {
        let error_message = error_message.map(|s| s.to_string());
        self.events.emit(EngineEvent::DeliveryFailed { delivery_log_id: id, reason: reason.to_string() });
        self.run_db(move |conn| {
            delivery_log_service::mark_failed(conn, id, reason.as_str(), error_message.as_deref(), api_response_code)
        })
        .await;
    }

    async fn run_db<F>(&self, f: F)
    where
        F: FnOnce(&mut diesel::PgConnection) -> Result<(), crate::app::error::SchedulingError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .expect("spawn_blocking panicked");

        if let Err(err) = result {
            error!(error = %err, "delivery log update failed");
        }
    }
}
