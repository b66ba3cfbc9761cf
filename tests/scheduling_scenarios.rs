//! End-to-end scheduling scenarios driven against a real Postgres test database.

mod common;

use chrono::{Datelike, NaiveDate, Timelike};
use diesel::prelude::*;
use serial_test::serial;

use birthday_engine::app::broker::memory::MemoryBroker;
use birthday_engine::app::engine::StrategyRegistry;
use birthday_engine::app::events::EventBus;
use birthday_engine::app::models::DeliveryStatus;
use birthday_engine::app::scheduler::{enqueue, precalc};
use birthday_engine::schema::delivery_logs::dsl as dl;

fn birthday_today_in(timezone: &str) -> NaiveDate {
    let tz: chrono_tz::Tz = timezone.parse().unwrap();
    let local_today = chrono::Utc::now().with_timezone(&tz).date_naive();
    NaiveDate::from_ymd_opt(1990, local_today.month(), local_today.day()).unwrap()
}

/// Scenario 1: a single US-East birthday runs all the way from SCHEDULED to QUEUED.
#[tokio::test]
#[serial]
async fn single_us_east_birthday_schedules_and_enqueues() {
    let pool = common::test_pool();
    let events = EventBus::new();
    let registry = StrategyRegistry::default();

    let user = common::insert_user(&pool, "America/New_York", Some(birthday_today_in("America/New_York")), None);

    let stats = precalc::run(&pool, &registry, &events).expect("precalc run");
    assert_eq!(stats.messages_scheduled, 1);
    assert_eq!(stats.duplicates_skipped, 0);

    let mut conn = pool.get().unwrap();
    let row = dl::delivery_logs
        .filter(dl::user_id.eq(user.id))
        .first::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .expect("expected one scheduled row");
    assert_eq!(row.status(), Some(DeliveryStatus::Scheduled));

    let ny: chrono_tz::Tz = "America/New_York".parse().unwrap();
    let local_send = row.scheduled_send_time.with_timezone(&ny);
    assert_eq!((local_send.hour(), local_send.minute()), (9, 0));

    let broker = MemoryBroker::new();
    let enqueue_stats = enqueue::run(&pool, &broker, std::time::Duration::from_secs(3600), &events)
        .await
        .expect("enqueue run");
    assert_eq!(enqueue_stats.advanced, 1);

    let mut conn = pool.get().unwrap();
    let row = dl::delivery_logs
        .filter(dl::user_id.eq(user.id))
        .first::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .unwrap();
    assert_eq!(row.status(), Some(DeliveryStatus::Queued));

    common::cleanup_user(&pool, user.id);
}

/// Scenario 2: running pre-calc twice in one UTC day must not create a second row.
#[tokio::test]
#[serial]
async fn repeat_precalc_is_idempotent() {
    let pool = common::test_pool();
    let events = EventBus::new();
    let registry = StrategyRegistry::default();

    let user = common::insert_user(&pool, "America/Chicago", Some(birthday_today_in("America/Chicago")), None);

    let first = precalc::run(&pool, &registry, &events).expect("first precalc run");
    assert_eq!(first.messages_scheduled, 1);
    assert_eq!(first.duplicates_skipped, 0);

    let second = precalc::run(&pool, &registry, &events).expect("second precalc run");
    assert_eq!(second.messages_scheduled, 0);
    assert_eq!(second.duplicates_skipped, 1);

    let mut conn = pool.get().unwrap();
    let count: i64 = dl::delivery_logs.filter(dl::user_id.eq(user.id)).count().get_result(&mut conn).unwrap();
    assert_eq!(count, 1);

    common::cleanup_user(&pool, user.id);
}

/// Scenario 3: a user with both a birthday and anniversary today produces two distinct rows.
#[tokio::test]
#[serial]
async fn birthday_and_anniversary_same_day_produce_two_rows() {
    let pool = common::test_pool();
    let events = EventBus::new();
    let registry = StrategyRegistry::default();

    let today = birthday_today_in("UTC");
    let user = common::insert_user(&pool, "UTC", Some(today), Some(today));

    let stats = precalc::run(&pool, &registry, &events).expect("precalc run");
    assert_eq!(stats.messages_scheduled, 2);

    let mut conn = pool.get().unwrap();
    let rows = dl::delivery_logs
        .filter(dl::user_id.eq(user.id))
        .load::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .unwrap();
    assert_eq!(rows.len(), 2);
    let mut keys: Vec<_> = rows.iter().map(|r| r.idempotency_key.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 2, "idempotency keys must be distinct per event type");

    let mut types: Vec<_> = rows.iter().filter_map(|r| r.event_type()).collect();
    types.sort_by_key(|t| t.as_str());
    assert!(types.iter().any(|t| t.as_str() == "BIRTHDAY"));
    assert!(types.iter().any(|t| t.as_str() == "ANNIVERSARY"));

    common::cleanup_user(&pool, user.id);
}

/// Scenario 4: twelve users across twelve timezones, all with today's birthday, scheduled with
/// Auckland first and Honolulu last when ordered by `scheduled_send_time`.
#[tokio::test]
#[serial]
async fn twelve_timezones_order_by_scheduled_send_time() {
    let pool = common::test_pool();
    let events = EventBus::new();
    let registry = StrategyRegistry::default();

    let zones = [
        "Pacific/Auckland",
        "Asia/Tokyo",
        "Asia/Shanghai",
        "Asia/Dubai",
        "Europe/Moscow",
        "Europe/Paris",
        "Europe/London",
        "America/New_York",
        "America/Chicago",
        "America/Denver",
        "America/Los_Angeles",
        "Pacific/Honolulu",
    ];

    let mut users = Vec::new();
    for zone in zones {
        users.push(common::insert_user(&pool, zone, Some(birthday_today_in(zone)), None));
    }

    let stats = precalc::run(&pool, &registry, &events).expect("precalc run");
    assert_eq!(stats.messages_scheduled, zones.len() as u64);

    let user_ids: Vec<_> = users.iter().map(|u| u.id).collect();
    let mut conn = pool.get().unwrap();
    let rows = dl::delivery_logs
        .filter(dl::user_id.eq_any(&user_ids))
        .order(dl::scheduled_send_time.asc())
        .load::<birthday_engine::app::models::DeliveryLog>(&mut conn)
        .unwrap();

    assert_eq!(rows.len(), zones.len());
    assert_eq!(rows.first().unwrap().user_id, users[0].id, "Auckland should be first");
    assert_eq!(rows.last().unwrap().user_id, users[zones.len() - 1].id, "Honolulu should be last");

    for user in &users {
        common::cleanup_user(&pool, user.id);
    }
}
