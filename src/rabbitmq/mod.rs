// src/rabbitmq/mod.rs
// Broker access: transport traits, their backends, and the retrying client

pub mod client;
pub mod lapin_transport;
pub mod memory;
pub mod retry;
pub mod transport;

// Re-export specific items to simplify imports elsewhere
pub use client::RabbitMQClient;
pub use lapin_transport::{LapinConnector, LapinSession};
pub use memory::{InMemoryBroker, InMemoryConnector};
pub use retry::RetryPolicy;
pub use transport::{BrokerSession, Connector, QueueInfo};
