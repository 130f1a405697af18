//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use peer_wire::config::{
    ConnectionConfig, LoggingConfig, PeerWireConfig, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_FRAME_SIZE,
    MIN_FRAME_SIZE,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = PeerWireConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_defaults() {
    let config = ConnectionConfig::default();
    assert_eq!(config.inactivity_timeout, Duration::from_secs(120));
    assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    assert!(config.outbound_queue_limit > 0);
}

#[test]
fn test_frame_size_below_minimum() {
    let mut config = PeerWireConfig::default();
    config.connection.max_frame_size = MIN_FRAME_SIZE - 1;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max frame size too small")));
}

#[test]
fn test_frame_size_at_minimum_is_valid() {
    let mut config = PeerWireConfig::default();
    config.connection.max_frame_size = MIN_FRAME_SIZE;
    assert!(config.validate().is_empty());
}

#[test]
fn test_excessive_frame_size() {
    let mut config = PeerWireConfig::default();
    config.connection.max_frame_size = 128 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max frame size too large")));
}

#[test]
fn test_zero_outbound_queue_limit() {
    let mut config = PeerWireConfig::default();
    config.connection.outbound_queue_limit = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Outbound queue limit must be greater than 0")));
}

#[test]
fn test_timeout_bounds() {
    let mut config = PeerWireConfig::default();
    config.connection.inactivity_timeout = Duration::from_millis(50);
    config.connection.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Inactivity timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_zero_command_buffer() {
    let mut config = PeerWireConfig::default();
    config.connection.command_buffer = 0;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Command buffer")));
}

#[test]
fn test_zero_event_buffer() {
    let mut config = PeerWireConfig::default();
    config.connection.event_buffer = 0;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Event buffer")));
}

#[test]
fn test_empty_app_name() {
    let mut config = PeerWireConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_multiple_errors_collected() {
    let mut config = PeerWireConfig::default();
    config.connection.max_frame_size = 0;
    config.connection.outbound_queue_limit = 0;
    config.logging.app_name = String::new();

    assert!(config.validate().len() >= 3);

    let err = config.validate_strict().unwrap_err();
    assert!(err.to_string().contains("Configuration validation failed"));
}

#[test]
fn test_from_toml_partial() {
    let toml = r#"
        [connection]
        inactivity_timeout = 30000
        max_frame_size = 32768
        outbound_queue_limit = 16
        command_buffer = 8
        shutdown_timeout = 1000

        [logging]
        app_name = "seeder"
        log_level = "debug"
        json_format = true
    "#;

    let config = PeerWireConfig::from_toml(toml).expect("valid toml");
    assert_eq!(config.connection.inactivity_timeout, Duration::from_secs(30));
    assert_eq!(config.connection.max_frame_size, 32768);
    assert_eq!(config.connection.outbound_queue_limit, 16);
    assert_eq!(config.connection.event_buffer, DEFAULT_EVENT_BUFFER);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    assert!(config.validate().is_empty());
}

#[test]
fn test_missing_sections_use_defaults() {
    let config = PeerWireConfig::from_toml("").expect("empty toml is valid");
    assert_eq!(config.connection.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    assert_eq!(config.logging.app_name, LoggingConfig::default().app_name);
}

#[test]
fn test_invalid_log_level_rejected() {
    let toml = r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        json_format = false
    "#;
    let err = PeerWireConfig::from_toml(toml).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_example_config_roundtrips() {
    let text = PeerWireConfig::example_config();
    let parsed = PeerWireConfig::from_toml(&text).expect("example config parses");
    assert_eq!(
        parsed.connection.inactivity_timeout,
        ConnectionConfig::default().inactivity_timeout
    );
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("peer-wire-config-{}.toml", std::process::id()));
    let config = PeerWireConfig::default_with_overrides(|c| {
        c.connection.outbound_queue_limit = 7;
    });

    config.save_to_file(&path).expect("save");
    let loaded = PeerWireConfig::from_file(&path).expect("load");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.connection.outbound_queue_limit, 7);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = PeerWireConfig::from_file("/nonexistent/peer-wire.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}
