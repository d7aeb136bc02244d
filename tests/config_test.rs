// Each file in the tests directory is treated as its own separate crate

use std::path::Path;
use std::time::Duration;

use rabbit_sdk::config::load_config_from;
use rabbit_sdk::RetryPolicy;

const FIXTURE: &str = "tests/fixtures/rabbitmq/configs/test_config.json";

#[test]
fn test_fixture_config_loads() {
    let config = load_config_from(Path::new(FIXTURE)).expect("Failed to load test config");

    assert_eq!(config.connection.host, "localhost");
    assert_eq!(config.connection.username, "guest");
    assert_eq!(config.connection.password, "guest");
    assert_eq!(config.connection.virtual_host, "vhost_rust");
    assert!(config.connection.confirm_publish);
    // Fields missing from the file fall back to defaults.
    assert_eq!(config.connection.connection_timeout_ms, 5000);
    assert_eq!(config.connection.heartbeat_seconds, 30);
}

#[test]
fn test_fixture_retry_settings_merge_with_defaults() {
    let config = load_config_from(Path::new(FIXTURE)).expect("Failed to load test config");

    assert_eq!(
        config.retry.fetch_policy(),
        RetryPolicy::new(3, Duration::from_millis(100))
    );
    assert_eq!(
        config.retry.publish_policy(),
        RetryPolicy::new(5, Duration::from_millis(250))
    );
}

#[test]
fn test_missing_config_file_is_an_error() {
    let err = load_config_from(Path::new("tests/fixtures/does_not_exist.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
