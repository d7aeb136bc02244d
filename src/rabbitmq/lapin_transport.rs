// src/rabbitmq/lapin_transport.rs
use async_trait::async_trait;
use chrono::Utc;
use lapin::{
    options::{
        BasicGetOptions, BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions,
        QueueDeleteOptions, QueuePurgeOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use super::transport::{BrokerSession, Connector, QueueInfo};
use crate::codec::CONTENT_TYPE;
use crate::config::BrokerConfig;
use crate::errors::{RabbitMQError, Result};

/// Connects to RabbitMQ through `lapin`.
#[derive(Debug, Clone)]
pub struct LapinConnector {
    config: BrokerConfig,
}

impl LapinConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

pub struct LapinSession {
    connection: Connection,
    channel: Channel,
    confirm_publish: bool,
}

#[async_trait]
impl Connector for LapinConnector {
    type Session = LapinSession;

    async fn connect(&self) -> Result<LapinSession> {
        info!(
            host = %self.config.host,
            port = self.config.port,
            vhost = %self.config.virtual_host,
            "Connecting to RabbitMQ"
        );

        let connection = timeout(
            self.config.connect_timeout(),
            Connection::connect_uri(self.config.amqp_uri(), ConnectionProperties::default()),
        )
        .await??;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RabbitMQError::ChannelError(format!("Failed to create channel: {}", e)))?;

        if self.config.confirm_publish {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await?;
        }

        info!(channel_id = channel.id(), "Connected to RabbitMQ");
        Ok(LapinSession {
            connection,
            channel,
            confirm_publish: self.config.confirm_publish,
        })
    }
}

#[async_trait]
impl BrokerSession for LapinSession {
    fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn queue_declare(&self, queue: &str) -> Result<QueueInfo> {
        let declared = self
            .channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await?;

        Ok(QueueInfo {
            name: declared.name().as_str().to_string(),
            message_count: declared.message_count(),
            consumer_count: declared.consumer_count(),
        })
    }

    async fn queue_delete(&self, queue: &str) -> Result<u32> {
        Ok(self
            .channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await?)
    }

    async fn queue_purge(&self, queue: &str) -> Result<u32> {
        Ok(self
            .channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await?)
    }

    async fn basic_get(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        let message = self
            .channel
            .basic_get(queue, BasicGetOptions { no_ack: true })
            .await?;

        Ok(message.map(|m| m.delivery.data))
    }

    async fn basic_publish(&self, queue: &str, body: &[u8]) -> Result<()> {
        let properties = BasicProperties::default()
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_content_type(CONTENT_TYPE.into())
            .with_timestamp(Utc::now().timestamp() as u64);

        let confirm = self
            .channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
            .await?;

        if self.confirm_publish {
            let confirmation = confirm.await?;
            if confirmation.is_nack() {
                return Err(RabbitMQError::PublishError(format!(
                    "Broker rejected message for queue '{}'",
                    queue
                )));
            }
            debug!(queue, "Publish confirmed by broker");
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.connection.status().connected() {
            info!("Closing RabbitMQ connection gracefully");
            self.connection.close(0, "Closing connection").await?;
        }
        Ok(())
    }
}
