// src/errors.rs

use lapin::Error as LapinError;
use serde_json::Error as SerdeError;
use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
pub enum RabbitMQError {
    #[error("Client is not initialized")]
    NotInitialized,

    #[error("RabbitMQ connection error: {0}")]
    ConnectionError(String),

    #[error("RabbitMQ channel error: {0}")]
    ChannelError(String),

    #[error("RabbitMQ broker error: {0}")]
    BrokerError(String),

    #[error("Message serialization error: {0}")]
    SerializationError(#[from] SerdeError),

    #[error("Message deserialization error: {0}")]
    DeserializationError(String),

    #[error("Payload must encode to a JSON object, got {0}")]
    InvalidPayload(&'static str),

    #[error("RabbitMQ publish error: {0}")]
    PublishError(String),

    #[error("Connection timeout: {0}")]
    TimeoutError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Broker state lock acquisition failed")]
    LockError,

    #[error("{operation} on queue '{queue}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        queue: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Custom Result type for RabbitMQ operations
pub type Result<T> = std::result::Result<T, RabbitMQError>;

impl RabbitMQError {
    /// True for errors that mean the connection or channel is gone.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            RabbitMQError::ConnectionError(_)
                | RabbitMQError::ChannelError(_)
                | RabbitMQError::TimeoutError(_)
        )
    }
}

// Converting from lapin errors
impl From<LapinError> for RabbitMQError {
    fn from(error: LapinError) -> Self {
        let error_text = error.to_string();

        match error {
            LapinError::InvalidConnectionState(_) | LapinError::IOError(_) => {
                RabbitMQError::ConnectionError(error_text)
            }
            LapinError::InvalidChannelState(_)
            | LapinError::InvalidChannel(_)
            | LapinError::ChannelsLimitReached => RabbitMQError::ChannelError(error_text),
            LapinError::ProtocolError(_) => RabbitMQError::BrokerError(error_text),
            _ => RabbitMQError::Unknown(error_text),
        }
    }
}

impl From<Elapsed> for RabbitMQError {
    fn from(_: Elapsed) -> Self {
        RabbitMQError::TimeoutError("Connection timed out".to_string())
    }
}

impl From<String> for RabbitMQError {
    fn from(message: String) -> Self {
        RabbitMQError::Unknown(message)
    }
}

impl From<&str> for RabbitMQError {
    fn from(message: &str) -> Self {
        RabbitMQError::Unknown(message.to_string())
    }
}
