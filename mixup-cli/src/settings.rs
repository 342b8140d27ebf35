//! CLI settings file
//!
//! The core `mixup::Config` sections plus a `[federation]` table for the
//! `federate` command.

use anyhow::{Context, Result};
use mixup::config::load_toml;
use mixup::Config;
use mixup_cluster::FederationConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub mixup: Config,
    #[serde(default)]
    pub federation: FederationConfig,
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path).with_context(|| format!("Invalid config {}", path.display()))
    }
}
