use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::app::engine::timezone::{self, EngineError};
use crate::app::models::{EventType, User};

/// Per-event-type behavior. Adding a new occasion means writing one of these and registering
/// it; no scheduler or worker code changes.
///
/// Strategies must be stateless across calls — no mutable fields, no per-call caching — so a
/// single instance can be shared across concurrent scheduler and worker tasks.
pub trait EventStrategy: Send + Sync {
    fn event_type(&self) -> EventType;

    /// The user field this strategy reads (e.g. `birthday_date`). `None` means the user has no
    /// date for this event type and is never eligible.
    fn event_date(&self, user: &User) -> Option<chrono::NaiveDate>;

    fn should_send(&self, user: &User, now_utc: DateTime<Utc>, tz: &Tz) -> bool {
        match self.event_date(user) {
            Some(date) => timezone::is_event_today(date, tz, now_utc),
            None => false,
        }
    }

    fn calculate_send_time(&self, local_date: chrono::NaiveDate, tz: &Tz) -> DateTime<Utc> {
        timezone::calculate_send_time(local_date, tz)
    }

    fn compose_message(&self, user: &User) -> String;

    fn validate(&self, user: &User) -> Result<(), String> {
        if user.timezone.trim().is_empty() {
            return Err("user has no timezone".to_string());
        }
        timezone::parse_zone(&user.timezone).map_err(|e: EngineError| e.to_string())?;
        if self.event_date(user).is_none() {
            return Err(format!("user has no {} date", self.event_type()));
        }
        Ok(())
    }
}

pub struct BirthdayStrategy;

impl EventStrategy for BirthdayStrategy {
    fn event_type(&self) -> EventType {
        EventType::Birthday
    }

    fn event_date(&self, user: &User) -> Option<chrono::NaiveDate> {
        user.birthday_date
    }

    fn compose_message(&self, user: &User) -> String {
        format!("Happy birthday, {}! Wishing you a wonderful day.", user.first_name)
    }
}

pub struct AnniversaryStrategy;

impl EventStrategy for AnniversaryStrategy {
    fn event_type(&self) -> EventType {
        EventType::Anniversary
    }

    fn event_date(&self, user: &User) -> Option<chrono::NaiveDate> {
        user.anniversary_date
    }

    fn compose_message(&self, user: &User) -> String {
        format!("Happy anniversary, {}! Here's to many more.", user.first_name)
    }
}

/// Holds the registered strategies the daily pre-calc scheduler iterates over.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn EventStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    pub fn register(&mut self, strategy: Box<dyn EventStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn all(&self) -> &[Box<dyn EventStrategy>] {
        &self.strategies
    }

    pub fn for_event_type(&self, event_type: EventType) -> Option<&dyn EventStrategy> {
        self.strategies
            .iter()
            .find(|s| s.event_type() == event_type)
            .map(|b| b.as_ref())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BirthdayStrategy));
        registry.register(Box::new(AnniversaryStrategy));
        registry
    }
}
