// src/rabbitmq/transport.rs
use async_trait::async_trait;

use crate::errors::Result;

/// Summary returned by the broker when a queue is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// Opens broker sessions. The client holds one and calls it again to reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: BrokerSession;

    /// Open a connection and a channel on it.
    async fn connect(&self) -> Result<Self::Session>;
}

/// One live connection plus one channel, operating on raw message bodies.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn queue_declare(&self, queue: &str) -> Result<QueueInfo>;

    /// Returns the number of messages deleted with the queue.
    async fn queue_delete(&self, queue: &str) -> Result<u32>;

    /// Returns the number of messages purged.
    async fn queue_purge(&self, queue: &str) -> Result<u32>;

    /// Fetch one message in no-ack mode. `None` when the queue is empty.
    async fn basic_get(&self, queue: &str) -> Result<Option<Vec<u8>>>;

    /// Publish through the default exchange with `queue` as routing key.
    async fn basic_publish(&self, queue: &str, body: &[u8]) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
