//! Configuration structures for the tslink runtime.
//!
//! Supports TOML deserialization with sensible defaults matching the
//! reference deployment (1 kHz digit rate, 40x oversampling) and
//! explicit values for production.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level link configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinkConfig {
    /// Bitcode transfer configuration.
    pub link: TransferConfig,

    /// Timestamp producer configuration.
    pub source: SourceConfig,

    /// Metrics and diagnostics configuration.
    pub metrics: MetricsConfig,
}

/// Physical line address on the digital-I/O device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSpec {
    /// Device identifier (e.g. "Dev2").
    pub device: String,
    /// Port number on the device.
    pub port: u32,
    /// Line number within the port.
    pub line: u32,
}

impl Default for LineSpec {
    fn default() -> Self {
        Self {
            device: String::from("Dev2"),
            port: 0,
            line: 0,
        }
    }
}

impl std::fmt::Display for LineSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/port{}/line{}", self.device, self.port, self.line)
    }
}

/// Supported digital-I/O drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DioBackend {
    /// In-memory loopback for testing and development.
    #[default]
    Loopback,
}

/// Bitcode transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Digital-I/O backend.
    pub backend: DioBackend,

    /// Logical digit rate as seen by the external recorder, in Hz.
    pub digit_rate_hz: u32,

    /// Physical samples per logical digit (clock-skew tolerance).
    pub repeat: usize,

    /// Idle-state polling interval for the shared timestamp cell.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Line carrying the low-latency marker bracket.
    pub marker_line: LineSpec,

    /// Line carrying the clocked bitcode output.
    pub data_line: LineSpec,

    /// Line reading back the bitcode (wired to `data_line`).
    pub readback_line: LineSpec,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            backend: DioBackend::Loopback,
            digit_rate_hz: 1_000,
            repeat: 40,
            poll_interval: Duration::from_micros(10),
            marker_line: LineSpec {
                device: String::from("Dev2"),
                port: 0,
                line: 3,
            },
            data_line: LineSpec {
                device: String::from("Dev2"),
                port: 0,
                line: 1,
            },
            readback_line: LineSpec {
                device: String::from("Dev2"),
                port: 0,
                line: 0,
            },
        }
    }
}

impl TransferConfig {
    /// Physical sample clock rate in Hz (`digit_rate_hz * repeat`).
    #[must_use]
    pub fn sample_rate_hz(&self) -> f64 {
        f64::from(self.digit_rate_hz) * self.repeat as f64
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the repeat factor or digit rate is zero, or
    /// if the clocked lines alias each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repeat == 0 {
            return Err(ConfigError::Invalid("repeat must be >= 1".into()));
        }
        if self.digit_rate_hz == 0 {
            return Err(ConfigError::Invalid("digit_rate_hz must be > 0".into()));
        }
        if self.data_line == self.readback_line {
            return Err(ConfigError::Invalid(
                "data_line and readback_line must be distinct lines".into(),
            ));
        }
        Ok(())
    }
}

/// Timestamp producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Interval between periodic timestamp publications.
    #[serde(with = "humantime_serde")]
    pub publish_interval: Duration,

    /// Number of publications before shutdown (0 = run until signaled).
    pub publish_count: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_secs(1),
            publish_count: 25,
        }
    }
}

/// Metrics and diagnostics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Size of the round-trip latency ring buffer.
    pub histogram_size: usize,

    /// Percentiles reported in the shutdown summary.
    pub percentiles: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 4_096,
            percentiles: vec![50.0, 90.0, 99.0],
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.link.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
