//! # Configuration Management
//!
//! Centralized configuration for the inspector protocol.
//!
//! This module provides structured configuration for the target-side service: which
//! client versions it talks to, size limits for decoding, how long callers wait on the
//! owning thread, and how snapshots are bounded.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - Payload and string limits bound memory per attachment
//! - Snapshot depth limit bounds traversal and decoding work
//! - Mutation timeout keeps a wedged owning thread from stalling connections

use crate::error::{ProtocolError, Result};
use crate::protocol::version::{ClientVersion, VersionRange};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current attachment frame version
pub const FRAME_VERSION: u8 = 1;

/// Magic bytes identifying attachments ("INSP")
pub const MAGIC_BYTES: [u8; 4] = [0x49, 0x4E, 0x53, 0x50];

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Protocol version this build speaks
pub const PROTOCOL_READABLE_VERSION: &str = "1.0.0";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct InspectorConfig {
    /// Wire protocol settings
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Mutation dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Snapshot scheduling settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InspectorConfig {
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

        if let Ok(version) = std::env::var("INSPECTOR_MIN_CLIENT_VERSION") {
            config.protocol.min_client_version = version;
        }

        if let Ok(version) = std::env::var("INSPECTOR_MAX_CLIENT_VERSION") {
            config.protocol.max_client_version = version;
        }

        if let Ok(limit) = std::env::var("INSPECTOR_MAX_IN_FLIGHT") {
            if let Ok(val) = limit.parse::<usize>() {
                config.protocol.max_in_flight = val;
            }
        }

        if let Ok(capacity) = std::env::var("INSPECTOR_OWNER_QUEUE_CAPACITY") {
            if let Ok(val) = capacity.parse::<usize>() {
                config.dispatch.owner_queue_capacity = val;
            }
        }

        if let Ok(timeout) = std::env::var("INSPECTOR_MUTATION_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.dispatch.mutation_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(depth) = std::env::var("INSPECTOR_MAX_DEPTH") {
            if let Ok(val) = depth.parse::<usize>() {
                config.snapshot.max_depth = val;
            }
        }

        if let Ok(level) = std::env::var("INSPECTOR_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
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
        errors.extend(self.protocol.validate());
        errors.extend(self.dispatch.validate());
        errors.extend(self.snapshot.validate());
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

/// Wire protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Version reported in snapshots
    pub server_version: String,

    /// Oldest client version accepted (inclusive)
    pub min_client_version: String,

    /// Newest client version accepted (inclusive)
    pub max_client_version: String,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,

    /// Maximum length of string attribute values in bytes
    pub max_string_len: usize,

    /// Requests one connection may have in progress before it stops reading
    pub max_in_flight: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            server_version: String::from(PROTOCOL_READABLE_VERSION),
            min_client_version: String::from("1.0.0"),
            max_client_version: String::from("1.99.99"),
            max_payload_size: MAX_PAYLOAD_SIZE,
            max_string_len: crate::core::value::MAX_STRING_LEN,
            max_in_flight: 32,
        }
    }
}

impl ProtocolConfig {
    /// Supported client version range
    pub fn version_range(&self) -> Result<VersionRange> {
        let min = ClientVersion::parse(&self.min_client_version).ok_or_else(|| {
            ProtocolError::ConfigError(format!(
                "Invalid min_client_version: '{}'",
                self.min_client_version
            ))
        })?;
        let max = ClientVersion::parse(&self.max_client_version).ok_or_else(|| {
            ProtocolError::ConfigError(format!(
                "Invalid max_client_version: '{}'",
                self.max_client_version
            ))
        })?;
        Ok(VersionRange::new(min, max))
    }

    /// Validate protocol configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_version.is_empty() {
            errors.push("Server version cannot be empty".to_string());
        }

        let min = ClientVersion::parse(&self.min_client_version);
        let max = ClientVersion::parse(&self.max_client_version);
        if min.is_none() {
            errors.push(format!(
                "Invalid min_client_version: '{}' (expected format: '1.2.3')",
                self.min_client_version
            ));
        }
        if max.is_none() {
            errors.push(format!(
                "Invalid max_client_version: '{}' (expected format: '1.2.3')",
                self.max_client_version
            ));
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                errors.push(format!(
                    "Client version range is empty: {} > {}",
                    self.min_client_version, self.max_client_version
                ));
            }
        }

        if self.max_payload_size < 1024 {
            errors.push("Max payload size too small (minimum: 1 KB)".to_string());
        } else if self.max_payload_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: {} bytes)",
                self.max_payload_size, MAX_PAYLOAD_SIZE
            ));
        }

        if self.max_string_len == 0 {
            errors.push("Max string length must be greater than 0".to_string());
        } else if self.max_string_len > self.max_payload_size {
            errors.push("Max string length cannot exceed max payload size".to_string());
        }

        if self.max_in_flight == 0 {
            errors.push("Max in-flight requests must be greater than 0".to_string());
        } else if self.max_in_flight > 10_000 {
            errors.push(format!(
                "Max in-flight requests too large: {} (max recommended: 10,000)",
                self.max_in_flight
            ));
        }

        errors
    }
}

/// Mutation dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Jobs that may wait for the owning thread before senders are held back
    pub owner_queue_capacity: usize,

    /// How long a modification waits for the owning thread
    #[serde(with = "duration_serde")]
    pub mutation_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            owner_queue_capacity: 256,
            mutation_timeout: timeout::MUTATION_TIMEOUT,
        }
    }
}

impl DispatchConfig {
    /// Validate dispatch configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.owner_queue_capacity == 0 {
            errors.push("Owner queue capacity must be greater than 0".to_string());
        } else if self.owner_queue_capacity > 100_000 {
            errors.push(format!(
                "Owner queue capacity too large: {} (max recommended: 100,000)",
                self.owner_queue_capacity
            ));
        }

        if self.mutation_timeout.as_millis() < 10 {
            errors.push("Mutation timeout too short (minimum: 10ms)".to_string());
        } else if self.mutation_timeout.as_secs() > 60 {
            errors.push("Mutation timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Snapshot scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Deepest hierarchy level captured or accepted
    pub max_depth: usize,

    /// How long a capture may wait for and occupy the owning thread
    #[serde(with = "duration_serde")]
    pub capture_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::core::serialization::MAX_SNAPSHOT_DEPTH,
            capture_timeout: timeout::CAPTURE_TIMEOUT,
        }
    }
}

impl SnapshotConfig {
    /// Validate snapshot configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_depth == 0 {
            errors.push("Max snapshot depth must be greater than 0".to_string());
        } else if self.max_depth > 4096 {
            errors.push(format!(
                "Max snapshot depth too large: {} (maximum: 4096)",
                self.max_depth
            ));
        }

        if self.capture_timeout.as_millis() < 100 {
            errors.push("Capture timeout too short (minimum: 100ms)".to_string());
        } else if self.capture_timeout.as_secs() > 300 {
            errors.push("Capture timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
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
            app_name: String::from("inspector-protocol"),
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
