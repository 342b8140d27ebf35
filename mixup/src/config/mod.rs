//! Configuration management
//!
//! Two layers:
//! - [`Config`]: process-level settings loaded from a TOML file
//!   (observability plus defaults for request fields)
//! - [`GroupingMixupConfig`] / [`RerankConfig`]: per-request settings

mod grouping;

pub use grouping::{
    GroupingMixupConfig, RerankConfig, DEFAULT_PAGINATION, DEFAULT_SHARD_SIZE,
    DEFAULT_WINDOW_SIZE,
};

use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub defaults: MixupDefaults,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,mixup=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

/// Values used for request fields that the caller leaves out
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MixupDefaults {
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,
    #[serde(default = "default_true")]
    pub pagination: bool,
    /// Page size when a request does not set one
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_window_size() -> i64 {
    DEFAULT_WINDOW_SIZE
}

fn default_shard_size() -> usize {
    DEFAULT_SHARD_SIZE
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    10
}

impl Default for MixupDefaults {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            shard_size: default_shard_size(),
            pagination: default_true(),
            size: default_page_size(),
        }
    }
}

impl MixupDefaults {
    /// Insert default `window_size`, `shard_size` and `pagination` into a raw
    /// request object where the caller did not set them.
    pub fn fill(&self, request: &mut serde_json::Value) {
        if let Some(obj) = request.as_object_mut() {
            obj.entry("window_size")
                .or_insert_with(|| self.window_size.into());
            obj.entry("shard_size")
                .or_insert_with(|| self.shard_size.into());
            obj.entry("pagination")
                .or_insert_with(|| self.pagination.into());
        }
    }
}

/// Load a TOML settings file into `T`. A missing file yields `T::default()`.
///
/// Settings types that embed [`Config`] (flattened) load through this too.
pub fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

impl Config {
    /// Log format, honoring the LOG_FORMAT env var
    pub fn log_format(&self) -> String {
        std::env::var("LOG_FORMAT").unwrap_or_else(|_| self.observability.log_format.clone())
    }

    /// Log filter, honoring the RUST_LOG env var
    pub fn log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.observability.log_level.clone())
    }
}
