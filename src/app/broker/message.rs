use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::{DieselUlid, EventType};

/// Wire payload carried by the broker. `message_id` doubles as the AMQP message-id and
/// equals the owning DeliveryLog row id, so redeliveries are trivially traceable back to a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerMessage {
    pub message_id: DieselUlid,
    pub user_id: DieselUlid,
    pub message_type: EventType,
    pub scheduled_send_time: DateTime<Utc>,
    pub retry_count: u32,
    pub timestamp: i64,
}

impl BrokerMessage {
    pub fn routing_key(&self) -> &'static str {
        match self.message_type {
            EventType::Birthday => "birthday",
            EventType::Anniversary => "anniversary",
        }
    }
}
