//! Per-request grouping mixup configuration
//!
//! [`GroupingMixupConfig`] is the raw request surface as it is deserialized.
//! [`GroupingMixupConfig::compile`] validates it and resolves the decline
//! function, producing an immutable [`RerankConfig`] for one request.

use crate::error::{Error, Result};
use crate::ranking::decline::{DeclineFunction, DeclineRegistry, DeclineSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_WINDOW_SIZE: i64 = 10_000;
pub const DEFAULT_SHARD_SIZE: usize = 1_000;
pub const DEFAULT_PAGINATION: bool = true;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingMixupConfig {
    /// Field whose value groups hits (e.g. a seller id)
    #[serde(default, alias = "field")]
    pub group_field: String,
    #[serde(alias = "rescore_script")]
    pub decline: DeclineSpec,
    /// Extra fields the decline function may read
    #[serde(default)]
    pub fields: Vec<String>,
    /// Number of top hits to re-rank; `<= 0` disables re-ranking
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    /// Maximum number of hits each partition contributes
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,
    /// Slice the re-ranked list into the requested page
    #[serde(default = "default_pagination")]
    pub pagination: bool,
}

fn default_window_size() -> i64 {
    DEFAULT_WINDOW_SIZE
}

fn default_shard_size() -> usize {
    DEFAULT_SHARD_SIZE
}

fn default_pagination() -> bool {
    DEFAULT_PAGINATION
}

impl GroupingMixupConfig {
    pub fn new(group_field: impl Into<String>, decline: DeclineSpec) -> Self {
        Self {
            group_field: group_field.into(),
            decline,
            fields: Vec::new(),
            window_size: DEFAULT_WINDOW_SIZE,
            shard_size: DEFAULT_SHARD_SIZE,
            pagination: DEFAULT_PAGINATION,
        }
    }

    pub fn with_window_size(mut self, window_size: i64) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size;
        self
    }

    pub fn with_pagination(mut self, pagination: bool) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Validate and resolve the decline function.
    ///
    /// Fails before any hit is touched when the group field is missing, the
    /// decline function cannot be built, or it reads an undeclared field.
    pub fn compile(&self, registry: &DeclineRegistry) -> Result<RerankConfig> {
        if self.group_field.trim().is_empty() {
            return Err(Error::Config(
                "Missing required group field for grouping mixup".to_string(),
            ));
        }
        if self.shard_size == 0 {
            return Err(Error::Config("shard_size must be at least 1".to_string()));
        }

        let decline = registry.resolve(&self.decline)?;
        if let Some(undeclared) = decline
            .required_fields()
            .iter()
            .find(|f| !self.fields.contains(*f))
        {
            return Err(Error::FieldResolution(format!(
                "Decline function [{}] reads field '{}' which is not declared in fields {:?}",
                decline.name(),
                undeclared,
                self.fields
            )));
        }

        Ok(RerankConfig {
            group_field: self.group_field.clone(),
            decline,
            fields: self.fields.clone(),
            window_size: self.window_size,
            shard_size: self.shard_size,
            pagination: self.pagination,
        })
    }
}

/// Validated, immutable configuration for one re-rank request.
#[derive(Clone)]
pub struct RerankConfig {
    pub group_field: String,
    pub decline: Arc<dyn DeclineFunction>,
    pub fields: Vec<String>,
    pub window_size: i64,
    pub shard_size: usize,
    pub pagination: bool,
}

impl RerankConfig {
    /// Window length for a list of `len` hits: `min(window_size, len)`, or 0
    /// when re-ranking is disabled.
    pub fn effective_window(&self, len: usize) -> usize {
        if self.window_size <= 0 {
            return 0;
        }
        usize::try_from(self.window_size).map_or(len, |w| w.min(len))
    }
}

impl fmt::Debug for RerankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerankConfig")
            .field("group_field", &self.group_field)
            .field("decline", &self.decline.name())
            .field("fields", &self.fields)
            .field("window_size", &self.window_size)
            .field("shard_size", &self.shard_size)
            .field("pagination", &self.pagination)
            .finish()
    }
}
