//! # Configuration Management
//!
//! Centralized configuration for peer wire connections.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! Durations are written as milliseconds in TOML.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

pub use crate::utils::timeout::INACTIVITY_TIMEOUT;

/// Protocol string sent in the handshake
pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

/// Default upper bound on a declared frame length (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Smallest usable frame bound: the Request/Cancel body (id + 3 x i32)
pub const MIN_FRAME_SIZE: usize = 13;

/// Default number of encoded messages waiting behind the in-flight write
pub const DEFAULT_OUTBOUND_QUEUE_LIMIT: usize = 256;

/// Default number of undelivered events before the connection stops reading
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PeerWireConfig {
    /// Per-connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PeerWireConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("PEER_WIRE_INACTIVITY_TIMEOUT_MS") {
            let val = timeout.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PEER_WIRE_INACTIVITY_TIMEOUT_MS: {e}"))
            })?;
            config.connection.inactivity_timeout = Duration::from_millis(val);
        }

        if let Ok(size) = std::env::var("PEER_WIRE_MAX_FRAME_SIZE") {
            config.connection.max_frame_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PEER_WIRE_MAX_FRAME_SIZE: {e}"))
            })?;
        }

        if let Ok(limit) = std::env::var("PEER_WIRE_OUTBOUND_QUEUE_LIMIT") {
            config.connection.outbound_queue_limit = limit.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PEER_WIRE_OUTBOUND_QUEUE_LIMIT: {e}"))
            })?;
        }

        if let Ok(level) = std::env::var("PEER_WIRE_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid PEER_WIRE_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Per-connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Close the connection after this long without receiving any bytes
    #[serde(with = "duration_serde")]
    pub inactivity_timeout: Duration,

    /// Largest declared frame length accepted before the connection is failed
    pub max_frame_size: usize,

    /// Maximum encoded messages queued behind the in-flight write
    pub outbound_queue_limit: usize,

    /// Capacity of the command channel between handles and the connection task
    pub command_buffer: usize,

    /// Capacity of the event channel; reading pauses while it is full
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Bound on finishing the in-flight write and signalling end of output on close
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: INACTIVITY_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue_limit: DEFAULT_OUTBOUND_QUEUE_LIMIT,
            command_buffer: 32,
            event_buffer: DEFAULT_EVENT_BUFFER,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.inactivity_timeout.as_millis() < 100 {
            errors.push("Inactivity timeout too short (minimum: 100ms)".to_string());
        } else if self.inactivity_timeout.as_secs() > 3600 {
            errors.push("Inactivity timeout too long (maximum: 1 hour)".to_string());
        }

        if self.max_frame_size < MIN_FRAME_SIZE {
            errors.push(format!(
                "Max frame size too small: {} bytes (minimum: {MIN_FRAME_SIZE})",
                self.max_frame_size
            ));
        } else if self.max_frame_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 64 MB)",
                self.max_frame_size
            ));
        }

        if self.outbound_queue_limit == 0 {
            errors.push("Outbound queue limit must be greater than 0".to_string());
        } else if self.outbound_queue_limit > 1_000_000 {
            errors.push(format!(
                "Outbound queue limit too large: {} (max recommended: 1,000,000)",
                self.outbound_queue_limit
            ));
        }

        if self.command_buffer == 0 {
            errors.push("Command buffer must be greater than 0".to_string());
        }

        if self.event_buffer == 0 {
            errors.push("Event buffer must be greater than 0".to_string());
        }

        if self.shutdown_timeout.as_millis() < 10 {
            errors.push("Shutdown timeout too short (minimum: 10ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }

    /// Validate and return Result - used by `PeerConnection::try_spawn`
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Connection configuration invalid:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("peer-wire"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
