use anyhow::Result;
use std::env;

/// Exchange, queue and routing-key names for the AMQP broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub exchange: String,
    pub queue: String,
    pub dlq: String,
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("BROKER_URL").unwrap_or_else(|_| "amqp://127.0.0.1:5672/%2f".to_string()),
            exchange: env::var("BROKER_EXCHANGE").unwrap_or_else(|_| "birthday.messages".to_string()),
            queue: env::var("BROKER_QUEUE").unwrap_or_else(|_| "birthday.messages.queue".to_string()),
            dlq: env::var("BROKER_DLQ").unwrap_or_else(|_| "birthday.messages.dlq".to_string()),
        })
    }

    pub fn routing_key(&self, event_type: &str) -> String {
        event_type.to_lowercase()
    }
}
