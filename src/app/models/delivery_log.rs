use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app::models::diesel_ulid::DieselUlid;
use crate::schema::delivery_logs;

/// Closed tag set of notification kinds this engine knows how to schedule.
///
/// New occasions register a [`crate::app::engine::strategy::EventStrategy`] implementation
/// rather than extending this match — this enum is the wire/storage tag, not the extension
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Birthday,
    Anniversary,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Birthday => "BIRTHDAY",
            EventType::Anniversary => "ANNIVERSARY",
        }
    }

    pub fn all() -> &'static [EventType] {
        &[EventType::Birthday, EventType::Anniversary]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BIRTHDAY" => Ok(EventType::Birthday),
            "ANNIVERSARY" => Ok(EventType::Anniversary),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// DeliveryLog lifecycle states. SENDING is a distinct claim-state from SENT so the
/// recovery pass can tell "a worker crashed mid-call" apart from "it finished".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Scheduled,
    Queued,
    Sending,
    Sent,
    Retrying,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Scheduled => "SCHEDULED",
            DeliveryStatus::Queued => "QUEUED",
            DeliveryStatus::Sending => "SENDING",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Retrying => "RETRYING",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Failed)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(DeliveryStatus::Scheduled),
            "QUEUED" => Ok(DeliveryStatus::Queued),
            "SENDING" => Ok(DeliveryStatus::Sending),
            "SENT" => Ok(DeliveryStatus::Sent),
            "RETRYING" => Ok(DeliveryStatus::Retrying),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// Terminal-failure reason tags. Only meaningful once `status = FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    UserDeleted,
    MaxRetries,
    Permanent4xx,
    Malformed,
    TooLate,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::UserDeleted => "user-deleted",
            FailureReason::MaxRetries => "max-retries",
            FailureReason::Permanent4xx => "permanent-4xx",
            FailureReason::Malformed => "malformed",
            FailureReason::TooLate => "too-late",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = delivery_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeliveryLog {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub message_type: String,
    pub scheduled_send_time: DateTime<Utc>,
    pub actual_send_time: Option<DateTime<Utc>>,
    pub status: String,
    pub retry_count: i32,
    pub idempotency_key: String,
    pub message_content: String,
    pub error_message: Option<String>,
    pub api_response_code: Option<i32>,
    pub api_response_body: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryLog {
    pub fn status(&self) -> Option<DeliveryStatus> {
        self.status.parse().ok()
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.message_type.parse().ok()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = delivery_logs)]
pub struct NewDeliveryLog {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub message_type: String,
    pub scheduled_send_time: DateTime<Utc>,
    pub status: String,
    pub idempotency_key: String,
    pub message_content: String,
}

/// Idempotency key: `eventType:userId:YYYY-MM-DD` in the user's local zone. Stable across
/// precalc re-runs and recovery re-derivation for the same occurrence.
pub fn idempotency_key(
    user_id: &DieselUlid,
    event_type: EventType,
    local_event_date: chrono::NaiveDate,
) -> String {
    format!("{}:{}:{}", event_type.as_str(), user_id, local_event_date.format("%Y-%m-%d"))
}
