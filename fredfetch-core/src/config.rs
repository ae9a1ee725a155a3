//! Fetch configuration: file model, defaults and credential resolution.

use crate::domain::{FetchOptions, SortOrder, DEFAULT_LIMIT};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the FRED API key.
pub const API_KEY_ENV: &str = "FRED_API_KEY";

/// Cache directory used when none is configured.
pub const DEFAULT_CACHE_DIR: &str = ".fred_cache";

/// Output file used when none is configured.
pub const DEFAULT_OUTPUT: &str = "fred_data.json";

/// Request timeout in seconds used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("API key required. Use --api-key or set FRED_API_KEY environment variable.")]
    MissingCredential,
}

/// Batch configuration file (JSON or TOML).
///
/// Every field except `series` is optional; command-line flags override it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default)]
    pub series: Vec<String>,
    pub limit: Option<u32>,
    pub sort_order: Option<SortOrder>,
    pub observation_start: Option<NaiveDate>,
    pub observation_end: Option<NaiveDate>,
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub no_cache: bool,
    pub cache_ttl_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub output: Option<PathBuf>,
}

impl FetchConfig {
    /// Load from a file. `.toml` files parse as TOML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(format!("JSON: {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(format!("TOML: {e}")))
    }

    /// Request options with defaults applied, validated.
    pub fn fetch_options(&self) -> Result<FetchOptions, ConfigError> {
        let options = FetchOptions {
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            sort_order: self.sort_order.unwrap_or_default(),
            observation_start: self.observation_start,
            observation_end: self.observation_end,
        };
        options
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(options)
    }

    /// `None` when caching is disabled.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        if self.no_cache {
            return None;
        }
        Some(
            self.cache_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
        )
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn output(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }
}

/// Pick the API key: explicit value first, then the environment value.
/// Blank values count as absent.
pub fn resolve_api_key(
    explicit: Option<String>,
    from_env: Option<String>,
) -> Result<String, ConfigError> {
    explicit
        .into_iter()
        .chain(from_env)
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
        .ok_or(ConfigError::MissingCredential)
}
