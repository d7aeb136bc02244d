//! Command-line front end for the RabbitMQ client facade.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rabbit_sdk::config::{self, CONFIG_FILE_NAME};
use rabbit_sdk::{BrokerConfig, Payload, RabbitMQClient, RetrySettings};

#[derive(Debug, Parser)]
#[command(name = "rabbit-sdk", version, about = "Queue admin, fetch and publish against RabbitMQ")]
struct Cli {
    /// JSON config file. Without it, RabbitSdk.json is searched for in ./, ./config
    /// and the home directory, then RABBITMQ_* environment variables are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Declare a queue
    Declare { queue: String },
    /// Delete a queue
    Delete { queue: String },
    /// Remove all ready messages from a queue
    Purge { queue: String },
    /// Fetch one message and print it as JSON
    Get { queue: String },
    /// Publish a JSON object, e.g. '{"task": "resize"}'
    Publish { queue: String, message: String },
    /// Write a default config file
    InitConfig {
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        config::create_default_config_file(path)?;
        println!("Configuration file created at: {}", path.display());
        return Ok(());
    }

    let (broker, retry) = match &cli.config {
        Some(path) => {
            let loaded = config::load_config_from(path)?;
            (loaded.connection, loaded.retry)
        }
        None => match config::find_config_file() {
            Ok(path) => {
                info!("Using config file {}", path.display());
                let loaded = config::load_config_from(&path)?;
                (loaded.connection, loaded.retry)
            }
            Err(_) => (BrokerConfig::from_env()?, RetrySettings::default()),
        },
    };

    let mut client = RabbitMQClient::connect(broker)
        .await
        .context("Failed to connect to RabbitMQ")?
        .with_retry_settings(&retry);

    let outcome = run(&mut client, cli.command).await;
    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }
    outcome
}

async fn run(client: &mut RabbitMQClient, command: Command) -> Result<()> {
    match command {
        Command::Declare { queue } => {
            let declared = client.queue_declare(&queue).await?;
            println!(
                "{}: {} messages, {} consumers",
                declared.name, declared.message_count, declared.consumer_count
            );
        }
        Command::Delete { queue } => {
            let deleted = client.queue_delete(&queue).await?;
            println!("Deleted {} ({} messages)", queue, deleted);
        }
        Command::Purge { queue } => {
            let purged = client.queue_purge(&queue).await?;
            println!("Purged {} messages from {}", purged, queue);
        }
        Command::Get { queue } => match client.get::<Payload>(&queue).await? {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
            None => println!("{} is empty", queue),
        },
        Command::Publish { queue, message } => {
            let payload: Payload = serde_json::from_str(&message)
                .map_err(|e| anyhow!("Message must be a JSON object: {}", e))?;
            client.publish(&queue, &payload).await?;
            info!(queue = %queue, "Published message");
        }
        Command::InitConfig { path } => config::create_default_config_file(&path)?,
    }
    Ok(())
}
