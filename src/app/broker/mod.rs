pub mod amqp;
pub mod memory;
pub mod message;

pub use message::BrokerMessage;

use async_trait::async_trait;
use thiserror::Error;

/// Durable message broker contract: publisher confirms on the way in, per-message ack/nack/reject
/// on the way out. `amqp` is the real AMQP-backed implementation; `memory` is an in-process
/// double used by scheduler and worker tests.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("publish was not confirmed by the broker")]
    PublishUnconfirmed,
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),
    #[error("failed to serialize broker message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    /// All broker errors are transient from the scheduler's point of view: an unconfirmed
    /// publish rolls the enqueue transaction back and leaves the row SCHEDULED for the next run.
    pub fn is_transient(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes with publisher confirms; returns only once the broker has durably accepted the
    /// message. An unconfirmed publish surfaces as `BrokerError::PublishUnconfirmed`.
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError>;
}

/// One in-flight message pulled off the consume side, plus its ack/nack/reject handle.
pub struct Delivery {
    pub message: BrokerMessage,
    handle: Box<dyn DeliveryHandle>,
}

impl Delivery {
    pub fn new(message: BrokerMessage, handle: Box<dyn DeliveryHandle>) -> Self {
        Self { message, handle }
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.handle.ack().await
    }

    /// Redelivers with `x-retry-count` incremented.
    pub async fn nack_requeue(self, next_retry_count: u32) -> Result<(), BrokerError> {
        self.handle.nack_requeue(next_retry_count).await
    }

    /// Terminal reject: routes to the dead-letter queue.
    pub async fn reject_to_dlq(self) -> Result<(), BrokerError> {
        self.handle.reject_to_dlq().await
    }
}

#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError>;
    async fn nack_requeue(self: Box<Self>, next_retry_count: u32) -> Result<(), BrokerError>;
    async fn reject_to_dlq(self: Box<Self>) -> Result<(), BrokerError>;
}

/// One consumer bound to the main queue with the configured prefetch.
#[async_trait]
pub trait Consumer: Send {
    async fn recv(&mut self) -> Option<Delivery>;
}
