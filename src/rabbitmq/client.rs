// src/rabbitmq/client.rs
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::lapin_transport::LapinConnector;
use super::retry::RetryPolicy;
use super::transport::{BrokerSession, Connector, QueueInfo};
use crate::codec;
use crate::config::{BrokerConfig, RetrySettings};
use crate::errors::{RabbitMQError, Result};

/// Holds one connection and one channel to the broker and reconnects when
/// fetch or publish find it gone.
///
/// Not meant for concurrent callers: every operation takes `&mut self`.
pub struct RabbitMQClient<C: Connector = LapinConnector> {
    connector: C,
    session: Option<Arc<C::Session>>,
    initialized: bool,
    fetch_policy: RetryPolicy,
    publish_policy: RetryPolicy,
}

impl RabbitMQClient<LapinConnector> {
    /// Validate `config` and open the connection. Failure here is not retried.
    pub async fn connect(config: BrokerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RabbitMQError::ConfigError(e.to_string()))?;

        let mut client = Self::with_connector(LapinConnector::new(config));
        client.init().await?;
        Ok(client)
    }
}

impl<C: Connector> RabbitMQClient<C> {
    /// Build a client that has not connected yet. Call [`init`](Self::init) next.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            session: None,
            initialized: false,
            fetch_policy: RetryPolicy::fetch(),
            publish_policy: RetryPolicy::publish(),
        }
    }

    pub fn with_retry_policies(mut self, fetch: RetryPolicy, publish: RetryPolicy) -> Self {
        self.fetch_policy = fetch;
        self.publish_policy = publish;
        self
    }

    pub fn with_retry_settings(self, settings: &RetrySettings) -> Self {
        self.with_retry_policies(settings.fetch_policy(), settings.publish_policy())
    }

    pub async fn init(&mut self) -> Result<()> {
        let session = self.connector.connect().await?;
        self.session = Some(Arc::new(session));
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.is_connected())
    }

    pub async fn queue_declare(&mut self, queue: &str) -> Result<QueueInfo> {
        let session = self.live_session().await?;
        let info = session.queue_declare(queue).await?;
        debug!(queue, messages = info.message_count, "Declared queue");
        Ok(info)
    }

    pub async fn queue_delete(&mut self, queue: &str) -> Result<u32> {
        let session = self.live_session().await?;
        let deleted = session.queue_delete(queue).await?;
        debug!(queue, deleted, "Deleted queue");
        Ok(deleted)
    }

    pub async fn queue_purge(&mut self, queue: &str) -> Result<u32> {
        let session = self.live_session().await?;
        let purged = session.queue_purge(queue).await?;
        debug!(queue, purged, "Purged queue");
        Ok(purged)
    }

    /// Fetch and auto-acknowledge one message. `Ok(None)` when the queue is empty.
    pub async fn get<T: DeserializeOwned>(&mut self, queue: &str) -> Result<Option<T>> {
        let policy = self.fetch_policy;
        let body = self
            .with_retry(policy, "get", queue, |session| async move {
                session.basic_get(queue).await
            })
            .await?;

        body.map(|bytes| codec::decode(&bytes)).transpose()
    }

    /// Publish `data`, which must serialize to a JSON object, to `queue`
    /// through the default exchange.
    pub async fn publish<T: Serialize + ?Sized>(&mut self, queue: &str, data: &T) -> Result<()> {
        let body = codec::encode(data)?;
        let policy = self.publish_policy;
        let body = body.as_slice();

        self.with_retry(policy, "publish", queue, |session| async move {
            session.basic_publish(queue, body).await
        })
        .await?;

        debug!(queue, bytes = body.len(), "Published message");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.initialized = false;
        if let Some(session) = self.session.take() {
            session.close().await?;
            info!("Closed broker session");
        }
        Ok(())
    }

    /// The current session, reopened if the connection was lost.
    async fn live_session(&mut self) -> Result<Arc<C::Session>> {
        if !self.initialized {
            return Err(RabbitMQError::NotInitialized);
        }

        if let Some(session) = &self.session {
            if session.is_connected() {
                return Ok(Arc::clone(session));
            }
            warn!("Broker connection lost, reconnecting");
        }

        self.session = None;
        let session = Arc::new(self.connector.connect().await?);
        self.session = Some(Arc::clone(&session));
        info!("Reconnected to broker");
        Ok(session)
    }

    async fn with_retry<T, F, Fut>(
        &mut self,
        policy: RetryPolicy,
        operation: &'static str,
        queue: &str,
        mut attempt_op: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<C::Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.initialized {
            return Err(RabbitMQError::NotInitialized);
        }

        let mut last_error = String::new();
        for attempt in 1..=policy.max_attempts {
            let outcome = match self.live_session().await {
                Ok(session) => attempt_op(session).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        operation,
                        queue,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "Broker operation failed"
                    );
                    if err.is_connection_loss() {
                        self.session = None;
                    }
                    last_error = err.to_string();

                    if policy.has_next(attempt) {
                        sleep(policy.delay).await;
                    }
                }
            }
        }

        error!(operation, queue, attempts = policy.max_attempts, "Giving up on broker operation");
        Err(RabbitMQError::RetriesExhausted {
            operation,
            queue: queue.to_string(),
            attempts: policy.max_attempts,
            last_error,
        })
    }
}
