// src/config.rs
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rabbitmq::RetryPolicy;

pub const CONFIG_FILE_NAME: &str = "RabbitSdk.json";

/// Connection parameters for a single broker.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub virtual_host: String,
    #[serde(default = "default_timeout")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u16,
    #[serde(default)]
    pub confirm_publish: bool,
}

/// Retry settings as they appear in the config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,
    #[serde(default = "default_attempts")]
    pub publish_attempts: u32,
    #[serde(default = "default_publish_delay")]
    pub publish_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SdkConfig {
    pub connection: BrokerConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

// Default values
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 5672 }
fn default_credential() -> String { "guest".to_string() }
fn default_vhost() -> String { "/".to_string() }
fn default_timeout() -> u64 { 5000 }
fn default_heartbeat() -> u16 { 30 }
fn default_attempts() -> u32 { 5 }
fn default_fetch_delay() -> u64 { 100 }
fn default_publish_delay() -> u64 { 500 }

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new(
            default_host(),
            default_port(),
            default_credential(),
            default_credential(),
            default_vhost(),
        )
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            fetch_attempts: default_attempts(),
            fetch_delay_ms: default_fetch_delay(),
            publish_attempts: default_attempts(),
            publish_delay_ms: default_publish_delay(),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("virtual_host", &self.virtual_host)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("heartbeat_seconds", &self.heartbeat_seconds)
            .field("confirm_publish", &self.confirm_publish)
            .finish()
    }
}

impl BrokerConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        virtual_host: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            virtual_host: virtual_host.into(),
            connection_timeout_ms: default_timeout(),
            heartbeat_seconds: default_heartbeat(),
            confirm_publish: false,
        }
    }

    /// Load from `RABBITMQ_*` environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BrokerConfig::new(
            lookup("RABBITMQ_HOST").unwrap_or_else(default_host),
            match lookup("RABBITMQ_PORT") {
                Some(val) => val.parse().context("RABBITMQ_PORT must be a port number")?,
                None => default_port(),
            },
            lookup("RABBITMQ_USERNAME").unwrap_or_else(default_credential),
            lookup("RABBITMQ_PASSWORD").unwrap_or_else(default_credential),
            lookup("RABBITMQ_VHOST").unwrap_or_else(default_vhost),
        );

        if let Some(val) = lookup("RABBITMQ_CONNECT_TIMEOUT_MS") {
            config.connection_timeout_ms = val
                .parse()
                .context("RABBITMQ_CONNECT_TIMEOUT_MS must be an integer")?;
        }
        if let Some(val) = lookup("RABBITMQ_HEARTBEAT_SECONDS") {
            config.heartbeat_seconds = val
                .parse()
                .context("RABBITMQ_HEARTBEAT_SECONDS must be an integer")?;
        }
        if let Some(val) = lookup("RABBITMQ_CONFIRM_PUBLISH") {
            config.confirm_publish = val
                .parse()
                .context("RABBITMQ_CONFIRM_PUBLISH must be true or false")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("Configuration error: host cannot be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("Configuration error: port cannot be 0"));
        }
        if self.username.is_empty() {
            return Err(anyhow!("Configuration error: username cannot be empty"));
        }
        if self.virtual_host.is_empty() {
            return Err(anyhow!("Configuration error: virtual_host cannot be empty"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// The AMQP URI for this config. Credentials and vhost are passed
    /// structurally, so no percent-encoding is involved.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.virtual_host.clone(),
            query: AMQPQueryString {
                heartbeat: Some(self.heartbeat_seconds),
                connection_timeout: Some(self.connection_timeout_ms),
                ..AMQPQueryString::default()
            },
        }
    }
}

impl RetrySettings {
    pub fn validate(&self) -> Result<()> {
        if self.fetch_attempts == 0 || self.publish_attempts == 0 {
            return Err(anyhow!("Configuration error: retry attempts must be at least 1"));
        }
        Ok(())
    }

    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_attempts, Duration::from_millis(self.fetch_delay_ms))
    }

    pub fn publish_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.publish_attempts, Duration::from_millis(self.publish_delay_ms))
    }
}

// Configuration loading and management functions
pub fn find_config_file() -> Result<PathBuf> {
    find_config_file_in(Path::new("."), home::home_dir().as_deref())
}

/// Search `base`, then `base/config`, then `home` (as a dotfile).
pub fn find_config_file_in(base: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let locations = [
        ("Current directory", base.join(CONFIG_FILE_NAME)),
        ("Config directory", base.join("config").join(CONFIG_FILE_NAME)),
    ];

    for (location_name, path) in locations.iter() {
        if path.exists() {
            debug!("Found config file in {}: {}", location_name, path.display());
            return Ok(path.clone());
        }
    }

    if let Some(home_dir) = home {
        let home_config = home_dir.join(format!(".{}", CONFIG_FILE_NAME));
        if home_config.exists() {
            debug!("Found config file in home directory: {}", home_config.display());
            return Ok(home_config);
        }
    }

    Err(anyhow!(
        "Could not find {} in the current directory, ./config, or the home directory",
        CONFIG_FILE_NAME
    ))
}

pub fn load_config_from(config_path: &Path) -> Result<SdkConfig> {
    let config_content = fs::read_to_string(config_path)
        .context(format!("Failed to read config file at {}", config_path.display()))?;

    let config: SdkConfig = serde_json::from_str(&config_content)
        .context("Configuration file contains invalid JSON or missing required fields")?;

    config.connection.validate()?;
    config.retry.validate()?;

    Ok(config)
}

pub fn create_default_config_file(path: &Path) -> Result<()> {
    let default_config = SdkConfig {
        connection: BrokerConfig::default(),
        retry: RetrySettings::default(),
    };

    let json = serde_json::to_string_pretty(&default_config)
        .context("Failed to serialize default configuration")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory at {}", parent.display()))?;
        }
    }

    fs::write(path, json)
        .context(format!("Failed to write configuration to {}", path.display()))?;

    info!("Created default configuration file at: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = BrokerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5672);
        assert_eq!(config.username, "guest");
        assert_eq!(config.virtual_host, "/");
        assert_eq!(config.connect_timeout(), Duration::from_millis(5000));
        assert!(!config.confirm_publish);
    }

    #[test]
    fn test_config_load_from_vars() {
        let config = BrokerConfig::from_lookup(lookup_from(&[
            ("RABBITMQ_HOST", "mq.internal"),
            ("RABBITMQ_PORT", "5673"),
            ("RABBITMQ_USERNAME", "user_rust"),
            ("RABBITMQ_PASSWORD", "secret"),
            ("RABBITMQ_VHOST", "vhost_rust"),
            ("RABBITMQ_CONNECT_TIMEOUT_MS", "1500"),
            ("RABBITMQ_CONFIRM_PUBLISH", "true"),
        ]))
        .unwrap();

        assert_eq!(config.host, "mq.internal");
        assert_eq!(config.port, 5673);
        assert_eq!(config.password, "secret");
        assert_eq!(config.virtual_host, "vhost_rust");
        assert_eq!(config.connection_timeout_ms, 1500);
        assert!(config.confirm_publish);
    }

    #[test]
    fn test_config_rejects_bad_port() {
        assert!(BrokerConfig::from_lookup(lookup_from(&[("RABBITMQ_PORT", "amqp")])).is_err());
        assert!(BrokerConfig::from_lookup(lookup_from(&[("RABBITMQ_PORT", "0")])).is_err());
    }

    #[test]
    fn test_config_rejects_empty_host() {
        let config = BrokerConfig::new("  ", 5672, "guest", "guest", "/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = BrokerConfig::new("localhost", 5672, "guest", "hunter2", "/");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn test_amqp_uri_carries_vhost_verbatim() {
        let config = BrokerConfig::new("localhost", 5672, "user", "p@ss/word", "/");
        let uri = config.amqp_uri();
        assert_eq!(uri.vhost, "/");
        assert_eq!(uri.authority.userinfo.password, "p@ss/word");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.query.heartbeat, Some(30));
    }

    #[test]
    fn test_retry_settings_policies() {
        let settings = RetrySettings::default();
        assert_eq!(settings.fetch_policy(), RetryPolicy::fetch());
        assert_eq!(settings.publish_policy(), RetryPolicy::publish());

        let zero = RetrySettings {
            fetch_attempts: 0,
            ..RetrySettings::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_default_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        create_default_config_file(&path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.connection, BrokerConfig::default());
        assert_eq!(loaded.retry, RetrySettings::default());
    }

    #[test]
    fn test_find_config_file_search_order() {
        let work = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let home_config = home.path().join(format!(".{}", CONFIG_FILE_NAME));

        assert!(find_config_file_in(work.path(), Some(home.path())).is_err());

        fs::write(&home_config, "{}").unwrap();
        assert_eq!(
            find_config_file_in(work.path(), Some(home.path())).unwrap(),
            home_config
        );

        let nested = work.path().join("config").join(CONFIG_FILE_NAME);
        create_default_config_file(&nested).unwrap();
        assert_eq!(find_config_file_in(work.path(), Some(home.path())).unwrap(), nested);

        let local = work.path().join(CONFIG_FILE_NAME);
        create_default_config_file(&local).unwrap();
        assert_eq!(find_config_file_in(work.path(), Some(home.path())).unwrap(), local);
        assert!(load_config_from(&local).is_ok());
    }

    #[test]
    fn test_load_config_reports_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
