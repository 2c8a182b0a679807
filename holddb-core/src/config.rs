//! Configuration for a hold
//!
//! Settings are read from a TOML file:
//!
//! ```toml
//! [store]
//! scan_batch_size = 100
//! codec = "bincode"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! slow_query_threshold_ms = 100
//! ```

use crate::codec::Codec;
use crate::query::DEFAULT_SCAN_BATCH_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hold configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldConfig {
    /// Store settings
    pub store: StoreSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Entries pulled from the store per scan batch
    pub scan_batch_size: usize,
    /// Encoding of records, keys and index key lists
    pub codec: Codec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: LogLevel,
    /// Log format
    pub format: LogFormat,
    /// Queries taking at least this long are logged as slow (0 disables)
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            codec: Codec::Bincode,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            slow_query_threshold_ms: 100,
        }
    }
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl HoldConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HoldConfig = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.scan_batch_size == 0 {
            return Err(anyhow::anyhow!("Scan batch size cannot be 0"));
        }
        Ok(())
    }
}
