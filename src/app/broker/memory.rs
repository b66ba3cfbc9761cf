use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::app::broker::{Broker, BrokerError, BrokerMessage, Consumer, Delivery, DeliveryHandle};

/// In-process stand-in for [`super::amqp::AmqpBroker`], used by scheduler and worker tests so
/// they don't need a running AMQP node.
pub struct MemoryBroker {
    tx: UnboundedSender<BrokerMessage>,
    rx: Mutex<Option<UnboundedReceiver<BrokerMessage>>>,
    dlq: Arc<StdMutex<Vec<BrokerMessage>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(Some(rx)), dlq: Arc::new(StdMutex::new(Vec::new())) }
    }

    /// Takes ownership of the receive half; call once per test worker.
    pub async fn consumer(&self) -> MemoryConsumer {
        let rx = self.rx.lock().await.take().expect("MemoryBroker::consumer called more than once");
        MemoryConsumer { rx, tx: self.tx.clone(), dlq: self.dlq.clone() }
    }

    /// Messages rejected via `reject_to_dlq`, in rejection order — the in-memory analogue of
    /// the AMQP dead-letter queue, useful for asserting DLQ landings in tests.
    pub fn dlq_messages(&self) -> Vec<BrokerMessage> {
        self.dlq.lock().unwrap().clone()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        self.tx
            .send(message.clone())
            .map_err(|_| BrokerError::ConnectionLost("memory broker receiver dropped".to_string()))
    }
}

pub struct MemoryConsumer {
    rx: UnboundedReceiver<BrokerMessage>,
    tx: UnboundedSender<BrokerMessage>,
    dlq: Arc<StdMutex<Vec<BrokerMessage>>>,
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn recv(&mut self) -> Option<Delivery> {
        let message = self.rx.recv().await?;
        let handle = Box::new(MemoryDeliveryHandle {
            tx: self.tx.clone(),
            dlq: self.dlq.clone(),
            message: message.clone(),
        });
        Some(Delivery::new(message, handle))
    }
}

struct MemoryDeliveryHandle {
    tx: UnboundedSender<BrokerMessage>,
    dlq: Arc<StdMutex<Vec<BrokerMessage>>>,
    message: BrokerMessage,
}

#[async_trait]
impl DeliveryHandle for MemoryDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Simulates broker redelivery: republishes with `retry_count` bumped so the next `recv()`
    /// hands back the retried message, same as `AmqpConsumer`'s republish-on-nack.
    async fn nack_requeue(self: Box<Self>, next_retry_count: u32) -> Result<(), BrokerError> {
        let mut retried = self.message.clone();
        retried.retry_count = next_retry_count;
        self.tx
            .send(retried)
            .map_err(|_| BrokerError::ConnectionLost("memory broker receiver dropped".to_string()))
    }

    async fn reject_to_dlq(self: Box<Self>) -> Result<(), BrokerError> {
        self.dlq.lock().unwrap().push(self.message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{DieselUlid, EventType};
    use chrono::Utc;

    fn sample_message() -> BrokerMessage {
        BrokerMessage {
            message_id: DieselUlid::new(),
            user_id: DieselUlid::new(),
            message_type: EventType::Birthday,
            scheduled_send_time: Utc::now(),
            retry_count: 0,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn publish_then_consume_round_trips_the_message() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.consumer().await;

        let message = sample_message();
        broker.publish(&message).await.unwrap();

        let delivery = consumer.recv().await.expect("expected one delivery");
        assert_eq!(delivery.message.message_id, message.message_id);
        delivery.ack().await.unwrap();
    }
}
