use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::sync::Arc;
use tracing::warn;

use crate::app::broker::{Broker, BrokerError, BrokerMessage, Consumer, Delivery, DeliveryHandle};
use crate::config::broker::BrokerConfig;

/// lapin-backed broker: direct exchange, durable main queue with a dead-letter exchange
/// pointed at the DLQ, publisher confirms on every publish.
pub struct AmqpBroker {
    channel: Channel,
    config: BrokerConfig,
}

impl AmqpBroker {
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        channel
            .queue_declare(
                &config.dlq,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        let mut main_args = FieldTable::default();
        main_args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
        main_args.insert("x-dead-letter-routing-key".into(), AMQPValue::LongString(config.dlq.clone().into()));
        main_args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                main_args,
            )
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        for routing_key in ["birthday", "anniversary"] {
            channel
                .queue_bind(
                    &config.queue,
                    &config.exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;
        }

        Ok(Self { channel, config: config.clone() })
    }

    pub async fn consumer(&self, prefetch: u16, consumer_tag: &str) -> Result<AmqpConsumer, BrokerError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        let consumer = self
            .channel
            .basic_consume(
                &self.config.queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        Ok(AmqpConsumer { inner: consumer, channel: self.channel.clone(), exchange: self.config.exchange.clone() })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        publish_on(&self.channel, &self.config.exchange, message).await
    }
}

async fn publish_on(channel: &Channel, exchange: &str, message: &BrokerMessage) -> Result<(), BrokerError> {
    let payload = serde_json::to_vec(message)?;
    let properties = BasicProperties::default()
        .with_message_id(message.message_id.to_string().into())
        .with_content_type("application/json".into())
        .with_delivery_mode(2) // persistent
        .with_headers({
            let mut headers = FieldTable::default();
            headers.insert("x-retry-count".into(), AMQPValue::LongInt(message.retry_count as i32));
            headers
        });

    let confirm = channel
        .basic_publish(
            exchange,
            message.routing_key(),
            BasicPublishOptions::default(),
            &payload,
            properties,
        )
        .await
        .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?
        .await
        .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

    if confirm.is_ack() {
        Ok(())
    } else {
        Err(BrokerError::PublishUnconfirmed)
    }
}

pub struct AmqpConsumer {
    inner: lapin::Consumer,
    channel: Channel,
    exchange: String,
}

#[async_trait]
impl Consumer for AmqpConsumer {
    /// `None` means the underlying stream has genuinely ended (connection closed); a malformed
    /// payload or a transient read error rejects/logs and moves on to the next delivery rather
    /// than stopping this consumer.
    async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let delivery = match self.inner.next().await {
                Some(Ok(delivery)) => delivery,
                Some(Err(err)) => {
                    warn!(error = %err, "amqp consumer stream error, continuing to next delivery");
                    continue;
                }
                None => return None,
            };

            let message: BrokerMessage = match serde_json::from_slice(&delivery.data) {
                Ok(m) => m,
                Err(err) => {
                    warn!(error = %err, "malformed broker message, rejecting to DLQ");
                    let _ = self
                        .channel
                        .basic_reject(delivery.delivery_tag, BasicRejectOptions { requeue: false })
                        .await;
                    continue;
                }
            };

            let handle = Box::new(AmqpDeliveryHandle {
                channel: self.channel.clone(),
                delivery_tag: delivery.delivery_tag,
                exchange: self.exchange.clone(),
                message: message.clone(),
            });

            return Some(Delivery::new(message, handle));
        }
    }
}

struct AmqpDeliveryHandle {
    channel: Channel,
    delivery_tag: u64,
    exchange: String,
    message: BrokerMessage,
}

#[async_trait]
impl DeliveryHandle for AmqpDeliveryHandle {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(self.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))
    }

    async fn nack_requeue(self: Box<Self>, next_retry_count: u32) -> Result<(), BrokerError> {
        // Reject the original delivery without server-side requeue, then republish with the
        // retry count header incremented so backoff and DLQ routing stay under our control
        // rather than the broker's native requeue loop.
        self.channel
            .basic_nack(self.delivery_tag, BasicNackOptions { requeue: false, ..Default::default() })
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))?;

        let mut retried = self.message.clone();
        retried.retry_count = next_retry_count;
        publish_on(&self.channel, &self.exchange, &retried).await
    }

    async fn reject_to_dlq(self: Box<Self>) -> Result<(), BrokerError> {
        self.channel
            .basic_reject(self.delivery_tag, BasicRejectOptions { requeue: false })
            .await
            .map_err(|e| BrokerError::ConnectionLost(e.to_string()))
    }
}
