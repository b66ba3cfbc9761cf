//! Worker retry/DLQ scenarios driven against a real worker, an in-memory broker, and a
//! scripted send client double.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serial_test::serial;
use tokio::sync::watch;

use birthday_engine::app::broker::memory::MemoryBroker;
use birthday_engine::app::broker::{Broker, BrokerMessage};
use birthday_engine::app::events::EventBus;
use birthday_engine::app::models::{DeliveryStatus, EventType};
use birthday_engine::app::send_client::{SendClient, SendError, SendOutcome};
use birthday_engine::app::services::delivery_log_service;
use birthday_engine::app::worker::Worker;
use birthday_engine::schema::delivery_logs::dsl as dl;

const MAX_RETRIES: i32 = 3;

/// Scripted send client: returns the next outcome off a fixed queue, repeating the last entry
/// once exhausted. Lets each test assert a precise call-count-dependent retry path.
struct ScriptedSendClient {
    script: Vec<Result<SendOutcome, SendError>>,
    calls: AtomicUsize,
}

impl ScriptedSendClient {
    fn new(script: Vec<Result<SendOutcome, SendError>>) -> Arc<Self> {
        Arc::new(Self { script, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl SendClient for ScriptedSendClient {
    async fn send(&self, _email: &str, _message: &str) -> Result<SendOutcome, SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = call.min(self.script.len() - 1);
        self.script[idx].clone()
    }
}

/// Schedules one QUEUED row for a brand new test user, bypassing pre-calc, and returns the row
/// id plus a `BrokerMessage` ready to publish.
async fn queued_row(pool: &birthday_engine::database::DbPool) -> (birthday_engine::app::models::DieselUlid, birthday_engine::app::models::DieselUlid, BrokerMessage) {
    let user = common::insert_user(pool, "UTC", Some(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()), None);
    let pool_clone = pool.clone();
    let user_id = user.id;
    let row = tokio::task::spawn_blocking(move || {
        let mut conn = pool_clone.get().unwrap();
        let outcome = delivery_log_service::schedule(
            &mut conn,
            user_id,
            EventType::Birthday,
            Utc::now().date_naive(),
            Utc::now(),
            "Happy birthday!".to_string(),
        )
        .unwrap();
        let row = match outcome {
            delivery_log_service::ScheduleOutcome::Inserted(row) => row,
            delivery_log_service::ScheduleOutcome::DuplicateSkipped => panic!("unexpected duplicate"),
        };
        delivery_log_service::claim_for_enqueue(&mut conn, row.id).unwrap().expect("row should claim cleanly")
    })
    .await
    .unwrap();

    let message = BrokerMessage {
        message_id: row.id,
        user_id: row.user_id,
        message_type: EventType::Birthday,
        scheduled_send_time: row.scheduled_send_time,
        retry_count: 0,
        timestamp: Utc::now().timestamp_millis(),
    };

    (row.id, user_id, message)
}

async fn run_worker_until_terminal(
    pool: birthday_engine::database::DbPool,
    send_client: Arc<dyn SendClient>,
    consumer: Box<dyn birthday_engine::app::broker::Consumer>,
    delivery_log_id: birthday_engine::app::models::DieselUlid,
) -> DeliveryStatus {
    let events = EventBus::new();
    let worker = Worker::new(pool.clone(), send_client, MAX_RETRIES, events);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        worker.run(consumer, shutdown_rx).await;
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let status = loop {
        let mut conn = pool.get().unwrap();
        let row = dl::delivery_logs
            .filter(dl::id.eq(delivery_log_id))
            .first::<birthday_engine::app::models::DeliveryLog>(&mut conn)
            .unwrap();
        if let Some(status) = row.status() {
            if status.is_terminal() {
                break status;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("delivery log never reached a terminal status");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    let _ = shutdown_tx.send(true);
    tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

    status
}

/// Scenario 5: two transient 500s then a 200 — final status SENT, retry_count = 2.
#[tokio::test]
#[serial]
async fn transient_failures_retry_then_succeed() {
    let pool = common::test_pool();
    let (delivery_log_id, user_id, message) = queued_row(&pool).await;

    let broker = MemoryBroker::new();
    broker.publish(&message).await.unwrap();
    let consumer = Box::new(broker.consumer().await);

    let send_client = ScriptedSendClient::new(vec![
        Err(SendError::Status { code: 500, body: "boom".to_string() }),
        Err(SendError::Status { code: 500, body: "boom again".to_string() }),
        Ok(SendOutcome { provider_message_id: "provider-123".to_string() }),
    ]);

    let status = run_worker_until_terminal(pool.clone(), send_client, consumer, delivery_log_id).await;
    assert_eq!(status, DeliveryStatus::Sent);

    let mut conn = pool.get().unwrap();
    let row = dl::delivery_logs
        .filter(dl::id.eq(delivery_log_id))
        .first::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .unwrap();
    assert_eq!(row.retry_count, 2);
    assert!(row.actual_send_time.is_some());

    common::cleanup_user(&pool, user_id);
}

/// Scenario 6: every attempt returns 500 — after MAX_RETRIES the row is FAILED, one message
/// lands on the DLQ, and no actual_send_time is set.
#[tokio::test]
#[serial]
async fn max_retries_exhausted_lands_on_dlq() {
    let pool = common::test_pool();
    let (delivery_log_id, user_id, message) = queued_row(&pool).await;

    let broker = MemoryBroker::new();
    broker.publish(&message).await.unwrap();
    let consumer = Box::new(broker.consumer().await);

    let send_client = ScriptedSendClient::new(vec![Err(SendError::Status { code: 500, body: "down".to_string() })]);

    let status = run_worker_until_terminal(pool.clone(), send_client, consumer, delivery_log_id).await;
    assert_eq!(status, DeliveryStatus::Failed);

    let mut conn = pool.get().unwrap();
    let row = dl::delivery_logs
        .filter(dl::id.eq(delivery_log_id))
        .first::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .unwrap();
    assert!(row.actual_send_time.is_none());
    assert!(row.error_message.is_some());
    assert_eq!(row.reason.as_deref(), Some("max-retries"));

    let dlq = broker.dlq_messages();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].message_id, delivery_log_id);

    common::cleanup_user(&pool, user_id);
}
