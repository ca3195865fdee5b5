//! RabbitMQ source for acceptance messages.

use crate::config::{AckMode, QueueConfig};
use crate::workers::source::{Acknowledger, MessageSource, QueueMessage};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer,
};
use service_core::error::AppError;

pub struct AmqpSource {
    // Held so the channel and connection stay open while consuming
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
    ack_mode: AckMode,
}

impl AmqpSource {
    /// Connects, declares the queue and registers the consumer.
    pub async fn connect(config: &QueueConfig) -> Result<Self, AppError> {
        tracing::info!(queue = %config.queue_name, "Connecting to RabbitMQ");

        let connection = Connection::connect(&config.uri, ConnectionProperties::default())
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to RabbitMQ: {}", e);
                AppError::QueueError(anyhow::anyhow!("Failed to connect to RabbitMQ: {}", e))
            })?;

        let channel = connection.create_channel().await.map_err(|e| {
            tracing::error!("Failed to open a channel: {}", e);
            AppError::QueueError(anyhow::anyhow!("Failed to open a channel: {}", e))
        })?;

        if config.ack_mode == AckMode::Manual {
            // Caps unacked deliveries so requeued messages are not redelivered in a burst
            channel
                .basic_qos(config.prefetch, BasicQosOptions::default())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to set channel prefetch: {}", e);
                    AppError::QueueError(anyhow::anyhow!("Failed to set channel prefetch: {}", e))
                })?;
        }

        let queue = channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                tracing::error!(queue = %config.queue_name, "Failed to declare queue: {}", e);
                AppError::QueueError(anyhow::anyhow!("Failed to declare a queue: {}", e))
            })?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                &config.consumer_tag,
                BasicConsumeOptions {
                    no_ack: config.ack_mode == AckMode::Auto,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to register a consumer: {}", e);
                AppError::QueueError(anyhow::anyhow!("Failed to register a consumer: {}", e))
            })?;

        tracing::info!(
            queue = %config.queue_name,
            ack_mode = ?config.ack_mode,
            prefetch = config.prefetch,
            "Consuming acceptance messages"
        );

        Ok(Self {
            _connection: connection,
            _channel: channel,
            consumer,
            ack_mode: config.ack_mode,
        })
    }
}

#[async_trait]
impl MessageSource for AmqpSource {
    async fn next_message(&mut self) -> Option<Result<QueueMessage, AppError>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(e) => {
                return Some(Err(AppError::QueueError(anyhow::anyhow!(
                    "Failed to receive delivery: {}",
                    e
                ))))
            }
        };

        let acknowledger: Option<Box<dyn Acknowledger>> = match self.ack_mode {
            AckMode::Auto => None,
            AckMode::Manual => Some(Box::new(AmqpAcknowledger {
                acker: delivery.acker,
            })),
        };

        Some(Ok(QueueMessage {
            payload: delivery.data,
            acknowledger,
        }))
    }
}

struct AmqpAcknowledger {
    acker: Acker,
}

#[async_trait]
impl Acknowledger for AmqpAcknowledger {
    async fn ack(&self) -> Result<(), AppError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| AppError::QueueError(anyhow::anyhow!("Failed to ack delivery: {}", e)))
    }

    async fn reject(&self, requeue: bool) -> Result<(), AppError> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(|e| AppError::QueueError(anyhow::anyhow!("Failed to nack delivery: {}", e)))
    }
}
