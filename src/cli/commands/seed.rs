use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};

use crate::app::engine::timezone;
use crate::app::models::{DieselUlid, NewUser};
use crate::app::services::user_service;
use crate::config::Config;
use crate::database;

/// Twelve timezones spanning the full UTC offset range, ordered Auckland-first so a
/// `scheduled_send_time ASC` listing runs earliest-local-time-of-day first.
const DEMO_TIMEZONES: &[&str] = &[
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

pub fn handle_seed() -> Result<()> {
    let config = Config::load()?;
    let pool = database::create_pool(&config)?;
    let mut conn = pool.get()?;
    let now = Utc::now();

    let mut created = 0;
    for (i, tz_name) in DEMO_TIMEZONES.iter().enumerate() {
        let tz = timezone::parse_zone(tz_name)?;
        let local_today = now.with_timezone(&tz).date_naive();
        let birthday = NaiveDate::from_ymd_opt(1990, local_today.month(), local_today.day())
            .unwrap_or(local_today);

        let new_user = NewUser {
            id: DieselUlid::new(),
            first_name: format!("Demo{i}"),
            last_name: Some(tz_name.replace('/', "_")),
            email: format!("demo{i}@example.test"),
            timezone: tz_name.to_string(),
            birthday_date: Some(birthday),
            anniversary_date: None,
        };

        user_service::create(&mut conn, new_user)?;
        created += 1;
    }

    println!("seeded {created} demo users across {} timezones", DEMO_TIMEZONES.len());
    Ok(())
}
