//! # Configuration Management
//!
//! Centralized configuration for the framing core.
//!
//! This module provides structured configuration for servers and sessions,
//! including listen parameters, frame limits, and logging options.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - The maximum frame size caps allocation per declared length; a header is
//!   rejected before any payload buffer is grown for it
//! - Timeouts on shutdown prevent a stuck session from pinning the process

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Size of the fixed frame header: `[length: i32][command_id: i32]`.
pub const HEADER_SIZE: usize = 8;

/// Max allowed payload size per frame (16 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default capacity of a session's receive buffer.
pub const DEFAULT_RECV_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default size of the per-read scratch chunk.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Default capacity of the per-session outbound frame queue.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Frame limits and buffer sizing
    #[serde(default)]
    pub frame: FrameConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
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

        if let Ok(addr) = std::env::var("FRAMEWIRE_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(max) = std::env::var("FRAMEWIRE_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = max.parse::<usize>() {
                config.frame.max_payload_size = val;
            }
        }

        if let Ok(capacity) = std::env::var("FRAMEWIRE_SEND_QUEUE_CAPACITY") {
            if let Ok(val) = capacity.parse::<usize>() {
                config.frame.send_queue_capacity = val;
            }
        }

        if let Ok(timeout) = std::env::var("FRAMEWIRE_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.shutdown_timeout = Duration::from_millis(val);
            }
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

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.frame.validate());
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

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Maximum number of concurrent sessions
    pub max_sessions: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            max_sessions: 1000,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:9000')",
                self.address
            ));
        }

        if self.max_sessions == 0 {
            errors.push("Max sessions must be greater than 0".to_string());
        } else if self.max_sessions > 100_000 {
            errors.push(format!(
                "Max sessions very high: {} (ensure system resources can support this)",
                self.max_sessions
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Frame limits and per-session buffer sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameConfig {
    /// Maximum allowed payload size per frame, in bytes. Headers declaring
    /// more than this are a fatal protocol violation for the session.
    pub max_payload_size: usize,

    /// Initial capacity of a session's receive buffer
    pub recv_buffer_capacity: usize,

    /// Size of the scratch chunk handed to each transport read
    pub read_chunk_size: usize,

    /// Capacity of the per-session outbound frame queue
    pub send_queue_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            recv_buffer_capacity: DEFAULT_RECV_BUFFER_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl FrameConfig {
    /// Validate frame configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > i32::MAX as usize {
            errors.push(format!(
                "Max payload size {} cannot exceed the i32 length field",
                self.max_payload_size
            ));
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_payload_size
            ));
        }

        if self.read_chunk_size == 0 {
            errors.push("Read chunk size cannot be 0".to_string());
        }

        if self.recv_buffer_capacity < HEADER_SIZE {
            errors.push(format!(
                "Receive buffer capacity must hold at least one header ({HEADER_SIZE} bytes)"
            ));
        }

        if self.send_queue_capacity == 0 {
            errors.push("Send queue capacity must be greater than 0".to_string());
        } else if self.send_queue_capacity > 1_000_000 {
            errors.push(format!(
                "Send queue capacity too large: {} (max recommended: 1,000,000)",
                self.send_queue_capacity
            ));
        }

        errors
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

    /// Whether to log to console
    pub log_to_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("framewire"),
            log_level: Level::INFO,
            log_to_console: true,
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
