//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::SegmentStoreConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub syslog: SyslogConfig,
}

/// Telemetry pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,

    #[serde(default = "default_max_segments")]
    pub max_segments: u64,

    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    #[serde(default = "default_aggregate_interval_ms")]
    pub aggregate_interval_ms: u64,

    #[serde(default = "default_dedup_interval_ms")]
    pub dedup_interval_ms: u64,

    #[serde(default = "default_raw_queue_capacity")]
    pub raw_queue_capacity: usize,

    #[serde(default = "default_error_queue_capacity")]
    pub error_queue_capacity: usize,

    #[serde(default = "default_aggregate_queue_capacity")]
    pub aggregate_queue_capacity: usize,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyslogConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,

    #[serde(default = "default_max_segments")]
    pub max_segments: u64,

    #[serde(default = "default_syslog_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

// Default value functions
fn default_data_dir() -> String { "./data".to_string() }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_segment_bytes() -> u64 { 10000 }
fn default_max_segments() -> u64 { 10 }
fn default_drain_interval_ms() -> u64 { 300 }
fn default_aggregate_interval_ms() -> u64 { 5000 }
fn default_dedup_interval_ms() -> u64 { 30000 }
fn default_raw_queue_capacity() -> usize { 500 }
fn default_error_queue_capacity() -> usize { 200 }
fn default_aggregate_queue_capacity() -> usize { 64 }
fn default_syslog_queue_capacity() -> usize { 200 }
fn default_batch_threshold() -> usize { 10 }
fn default_flush_timeout_ms() -> u64 { 3000 }

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_segment_bytes: default_max_segment_bytes(),
            max_segments: default_max_segments(),
            drain_interval_ms: default_drain_interval_ms(),
            aggregate_interval_ms: default_aggregate_interval_ms(),
            dedup_interval_ms: default_dedup_interval_ms(),
            raw_queue_capacity: default_raw_queue_capacity(),
            error_queue_capacity: default_error_queue_capacity(),
            aggregate_queue_capacity: default_aggregate_queue_capacity(),
        }
    }
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            max_segment_bytes: default_max_segment_bytes(),
            max_segments: default_max_segments(),
            queue_capacity: default_syslog_queue_capacity(),
            batch_threshold: default_batch_threshold(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl TelemetryConfig {
    /// Segment namespace for telemetry data: bare 4-digit indices with
    /// a `.jsonl` extension, e.g. `0001.jsonl`
    #[must_use]
    pub fn segment_store_config(&self) -> SegmentStoreConfig {
        SegmentStoreConfig {
            dir: PathBuf::from(&self.data_dir),
            file_prefix: String::new(),
            index_digits: 4,
            extension: "jsonl".to_string(),
            max_segment_bytes: self.max_segment_bytes,
            max_segments: self.max_segments,
        }
    }
}

impl SyslogConfig {
    /// Segment namespace for diagnostics: `log_`-prefixed 3-digit
    /// indices with a `.txt` extension, e.g. `log_000.txt`
    #[must_use]
    pub fn segment_store_config(&self) -> SegmentStoreConfig {
        SegmentStoreConfig {
            dir: PathBuf::from(&self.log_dir),
            file_prefix: "log_".to_string(),
            index_digits: 3,
            extension: "txt".to_string(),
            max_segment_bytes: self.max_segment_bytes,
            max_segments: self.max_segments,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use blackbox::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.telemetry.data_dir.is_empty() {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("telemetry data_dir cannot be empty")
            ));
        }

        if self.syslog.log_dir.is_empty() {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("syslog log_dir cannot be empty")
            ));
        }

        // Validate segment limits
        if self.telemetry.max_segment_bytes == 0 || self.syslog.max_segment_bytes == 0 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("max_segment_bytes must be greater than 0")
            ));
        }

        if self.telemetry.max_segments == 0 || self.syslog.max_segments == 0 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("max_segments must be greater than 0")
            ));
        }

        // Validate timing fields
        if self.telemetry.drain_interval_ms == 0 || self.telemetry.drain_interval_ms > 60000 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("drain_interval_ms must be between 1 and 60000")
            ));
        }

        if self.telemetry.aggregate_interval_ms == 0 || self.telemetry.aggregate_interval_ms > 600000 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("aggregate_interval_ms must be between 1 and 600000")
            ));
        }

        if self.telemetry.dedup_interval_ms == 0 || self.telemetry.dedup_interval_ms > 600000 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("dedup_interval_ms must be between 1 and 600000")
            ));
        }

        if self.syslog.flush_timeout_ms == 0 || self.syslog.flush_timeout_ms > 60000 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("flush_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.syslog.batch_threshold == 0 {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("batch_threshold must be greater than 0")
            ));
        }

        // A threshold past a bounded queue's capacity could never fire
        if self.syslog.queue_capacity > 0 && self.syslog.batch_threshold > self.syslog.queue_capacity {
            return Err(crate::error::BlackboxError::Config(
                toml::de::Error::custom("batch_threshold cannot exceed queue_capacity")
            ));
        }

        // Queue capacities themselves are not range-checked: 0 means unbounded
        Ok(())
    }
}
