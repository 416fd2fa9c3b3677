//! Configuration for the ping plugin.
//!
//! Settings can come from an optional YAML file; command-line flags and
//! environment variables override it (see `main.rs`). Example file:
//!
//! ```yaml
//! host: "8.8.8.8:google-public-dns-a,m.root-servers.net:m-root"
//! count: 3
//! wait: 500ms
//! acceptable_misses: 1
//! strict: false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin::default_tempfile;
use crate::sampler::{DEFAULT_ROUND_TIMEOUT, DEFAULT_ROUNDS, SamplingConfig};

/// Default host specification.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_count() -> i64 {
    i64::from(DEFAULT_ROUNDS)
}

fn default_wait() -> Duration {
    DEFAULT_ROUND_TIMEOUT
}

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host specification: `address_or_hostname[:label]`, comma-separated.
    #[serde(default = "default_host")]
    pub host: String,

    /// Temp file path handed to the output helper.
    #[serde(default)]
    pub tempfile: Option<PathBuf>,

    /// Echo rounds per fetch (default: 1).
    #[serde(default = "default_count")]
    pub count: i64,

    /// Wait per round (default: 1s).
    #[serde(default = "default_wait", with = "humantime_serde")]
    pub wait: Duration,

    /// Rounds an endpoint may miss (default: 0).
    #[serde(default)]
    pub acceptable_misses: u32,

    /// Fail on unresolvable hosts instead of skipping them.
    #[serde(default)]
    pub strict: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            tempfile: None,
            count: default_count(),
            wait: default_wait(),
            acceptable_misses: 0,
            strict: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// The round count is checked by [`AppConfig::sampling`], so a bad count
    /// reports the same error wherever it came from.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "host cannot be empty".to_string(),
            ));
        }

        if self.wait.is_zero() {
            return Err(ConfigError::ValidationError(
                "wait must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Temp file path, falling back to one derived from the host spec.
    pub fn tempfile_path(&self) -> PathBuf {
        self.tempfile
            .clone()
            .unwrap_or_else(|| default_tempfile(&self.host))
    }

    /// Sampling parameters for the engine.
    ///
    /// # Errors
    /// Returns `PingError::InvalidConfig` for a non-positive count.
    pub fn sampling(&self) -> crate::Result<SamplingConfig> {
        SamplingConfig::new(self.count, self.wait, self.acceptable_misses)
    }
}
