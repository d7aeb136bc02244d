//! An in-process broker that speaks the same transport traits as the
//! `lapin` backend.
//!
//! Queues live behind a shared handle, so several connectors (or a test and
//! the client under test) observe the same state. Faults can be injected to
//! exercise reconnect and retry paths without a running RabbitMQ.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::transport::{BrokerSession, Connector, QueueInfo};
use crate::errors::{RabbitMQError, Result};

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    // Sessions opened under an older generation are considered disconnected.
    generation: u64,
    connects: u32,
    failing_connects: u32,
    failing_operations: u32,
}

/// Shared handle to the in-memory queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector { broker: self.clone() }
    }

    /// Sever every open session, as if the broker restarted.
    pub fn drop_connections(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.generation += 1;
        }
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_connects = count;
        }
    }

    /// Make the next `count` session operations fail with a channel error.
    ///
    /// The session stays open, but the client treats a channel error as a
    /// lost connection and reconnects before its next attempt.
    pub fn fail_next_operations(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_operations = count;
        }
    }

    /// Number of successful connections opened so far.
    pub fn connect_count(&self) -> u32 {
        self.state.lock().map(|s| s.connects).unwrap_or_default()
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.queues.contains_key(queue))
            .unwrap_or(false)
    }

    /// Messages ready in `queue`, or `None` if it was never declared.
    pub fn queue_len(&self, queue: &str) -> Option<usize> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.queues.get(queue).map(VecDeque::len))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>> {
        self.state.lock().map_err(|_| RabbitMQError::LockError)
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    broker: InMemoryBroker,
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Session = InMemorySession;

    async fn connect(&self) -> Result<InMemorySession> {
        let mut state = self.broker.lock()?;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(RabbitMQError::ConnectionError("Connection refused".to_string()));
        }
        state.connects += 1;
        debug!(generation = state.generation, "Opened in-memory session");

        Ok(InMemorySession {
            broker: self.broker.clone(),
            generation: state.generation,
        })
    }
}

pub struct InMemorySession {
    broker: InMemoryBroker,
    generation: u64,
}

impl InMemorySession {
    /// Lock the broker for an operation, applying connection loss and injected faults.
    fn begin(&self) -> Result<MutexGuard<'_, BrokerState>> {
        let mut state = self.broker.lock()?;
        if state.generation != self.generation {
            return Err(RabbitMQError::ConnectionError("Connection closed".to_string()));
        }
        if state.failing_operations > 0 {
            state.failing_operations -= 1;
            return Err(RabbitMQError::ChannelError("Injected failure".to_string()));
        }
        Ok(state)
    }
}

fn not_found(queue: &str) -> RabbitMQError {
    RabbitMQError::BrokerError(format!("NOT_FOUND - no queue '{}'", queue))
}

#[async_trait]
impl BrokerSession for InMemorySession {
    fn is_connected(&self) -> bool {
        self.broker
            .state
            .lock()
            .map(|s| s.generation == self.generation)
            .unwrap_or(false)
    }

    async fn queue_declare(&self, queue: &str) -> Result<QueueInfo> {
        let mut state = self.begin()?;
        let messages = state.queues.entry(queue.to_string()).or_default();
        Ok(QueueInfo {
            name: queue.to_string(),
            message_count: messages.len() as u32,
            consumer_count: 0,
        })
    }

    async fn queue_delete(&self, queue: &str) -> Result<u32> {
        let mut state = self.begin()?;
        Ok(state
            .queues
            .remove(queue)
            .map(|messages| messages.len() as u32)
            .unwrap_or(0))
    }

    async fn queue_purge(&self, queue: &str) -> Result<u32> {
        let mut state = self.begin()?;
        let messages = state.queues.get_mut(queue).ok_or_else(|| not_found(queue))?;
        let purged = messages.len() as u32;
        messages.clear();
        Ok(purged)
    }

    async fn basic_get(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.begin()?;
        let messages = state.queues.get_mut(queue).ok_or_else(|| not_found(queue))?;
        Ok(messages.pop_front())
    }

    async fn basic_publish(&self, queue: &str, body: &[u8]) -> Result<()> {
        let mut state = self.begin()?;
        // Unroutable messages on the default exchange are dropped.
        if let Some(messages) = state.queues.get_mut(queue) {
            messages.push_back(body.to_vec());
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_delivery() {
        let broker = InMemoryBroker::new();
        let session = broker.connector().connect().await.unwrap();

        session.queue_declare("jobs").await.unwrap();
        session.basic_publish("jobs", b"first").await.unwrap();
        session.basic_publish("jobs", b"second").await.unwrap();

        assert_eq!(session.basic_get("jobs").await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(session.basic_get("jobs").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(session.basic_get("jobs").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unroutable_publish_is_dropped() {
        let broker = InMemoryBroker::new();
        let session = broker.connector().connect().await.unwrap();

        session.basic_publish("nowhere", b"lost").await.unwrap();
        assert!(!broker.has_queue("nowhere"));
        assert!(matches!(
            session.basic_get("nowhere").await,
            Err(RabbitMQError::BrokerError(_))
        ));
    }

    #[tokio::test]
    async fn test_declare_reports_depth() {
        let broker = InMemoryBroker::new();
        let session = broker.connector().connect().await.unwrap();

        session.queue_declare("jobs").await.unwrap();
        session.basic_publish("jobs", b"{}").await.unwrap();
        let info = session.queue_declare("jobs").await.unwrap();
        assert_eq!(info.message_count, 1);
        assert_eq!(info.name, "jobs");
    }

    #[tokio::test]
    async fn test_delete_missing_queue_is_ok() {
        let broker = InMemoryBroker::new();
        let session = broker.connector().connect().await.unwrap();
        assert_eq!(session.queue_delete("ghost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_connection_invalidates_session() {
        let broker = InMemoryBroker::new();
        let session = broker.connector().connect().await.unwrap();
        assert!(session.is_connected());

        broker.drop_connections();
        assert!(!session.is_connected());
        assert!(session.queue_declare("jobs").await.unwrap_err().is_connection_loss());

        let fresh = broker.connector().connect().await.unwrap();
        assert!(fresh.is_connected());
        assert_eq!(broker.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let broker = InMemoryBroker::new();
        broker.fail_next_connects(1);
        assert!(broker.connector().connect().await.is_err());

        let session = broker.connector().connect().await.unwrap();
        broker.fail_next_operations(1);
        assert!(session.queue_declare("jobs").await.is_err());
        assert!(session.queue_declare("jobs").await.is_ok());
        assert!(session.is_connected());
    }
}
