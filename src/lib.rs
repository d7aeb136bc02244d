//! A small RabbitMQ client facade: queue declare/delete/purge, single
//! message fetch and publish, with reconnect-and-retry around fetch and
//! publish.
//!
//! ```rust,no_run
//! use rabbit_sdk::{BrokerConfig, RabbitMQClient};
//! use serde_json::json;
//!
//! # async fn run() -> rabbit_sdk::Result<()> {
//! let config = BrokerConfig::new("localhost", 5672, "guest", "guest", "/");
//! let mut client = RabbitMQClient::connect(config).await?;
//!
//! client.queue_declare("jobs").await?;
//! client.publish("jobs", &json!({ "task": "resize", "width": 640 })).await?;
//! let job: Option<rabbit_sdk::Payload> = client.get("jobs").await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod rabbitmq;

pub use codec::Payload;
pub use config::{BrokerConfig, RetrySettings, SdkConfig};
pub use errors::{RabbitMQError, Result};
pub use rabbitmq::{RabbitMQClient, RetryPolicy};
