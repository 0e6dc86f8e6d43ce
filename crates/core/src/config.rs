//! Configuration management
//!
//! Settings live in a TOML file under the user's config directory
//! (`~/.config/jam/config.toml` on Linux). `JAM_CONFIG_DIR` overrides the
//! directory. A missing file is not an error; defaults apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checksum::{DEFAULT_CHUNK_SIZE, MAX_PART_SIZE, MIN_PART_SIZE, check_part_size};
use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "JAM_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Cloud session settings
///
/// Every field is optional. Unset fields fall through to the SDK's default
/// provider chain (environment, shared config files, instance metadata).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Named profile from the shared credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Region to create buckets in and sign requests for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Static access key, used together with `secret_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

impl SessionConfig {
    /// Overlay `overrides` on top of `self`
    ///
    /// A `Some` in `overrides` replaces the current value; a `None` keeps it.
    pub fn merge(self, overrides: SessionConfig) -> SessionConfig {
        SessionConfig {
            profile: overrides.profile.or(self.profile),
            region: overrides.region.or(self.region),
            endpoint: overrides.endpoint.or(self.endpoint),
            access_key: overrides.access_key.or(self.access_key),
            secret_key: overrides.secret_key.or(self.secret_key),
        }
    }

    /// Check that the settings are usable together
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::Config(format!(
                    "Endpoint must use http or https: {endpoint}"
                )));
            }
        }

        match (&self.access_key, &self.secret_key) {
            (Some(_), None) | (None, Some(_)) => Err(Error::Config(
                "access_key and secret_key must be set together".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Transfer settings for the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Multi-part chunk size in bytes, shared by checksums and uploads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum number of concurrent uploads or deletes
    #[serde(default = "default_parallel")]
    pub parallel: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_parallel() -> usize {
    4
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            parallel: default_parallel(),
        }
    }
}

/// Retry settings for transient transport failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use the default location, honouring `JAM_CONFIG_DIR`
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("jam"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    /// Use an explicit file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the configuration, returning defaults if the file does not exist
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: Config = toml::from_str(&content)?;
        config.session.validate()?;

        if config.sync.chunk_size == 0 {
            return Err(Error::Config("sync.chunk_size must be positive".to_string()));
        }
        if check_part_size(config.sync.chunk_size).is_err() {
            return Err(Error::Config(format!(
                "sync.chunk_size must be between {MIN_PART_SIZE} and {MAX_PART_SIZE} bytes, got {}",
                config.sync.chunk_size
            )));
        }
        if config.sync.parallel == 0 {
            return Err(Error::Config("sync.parallel must be positive".to_string()));
        }

        Ok(config)
    }

    /// Write the configuration, creating the parent directory if needed
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
