//! Cluster-specific error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while fanning a request out to partitions
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ClusterError {
    #[error("Partition error: {0}")]
    Partition(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Insufficient partitions: {0}")]
    InsufficientPartitions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Field resolution error: {0}")]
    FieldResolution(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClusterError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            ClusterError::Partition(_) => "partition",
            ClusterError::Timeout(_) => "timeout",
            ClusterError::InsufficientPartitions(_) => "insufficient_partitions",
            ClusterError::Config(_) => "config",
            ClusterError::FieldResolution(_) => "field_resolution",
            ClusterError::InvalidRequest(_) => "invalid_request",
            ClusterError::Internal(_) => "internal",
        }
    }

    /// Errors caused by the request itself (bad-request class)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClusterError::Config(_)
                | ClusterError::FieldResolution(_)
                | ClusterError::InvalidRequest(_)
        )
    }
}

impl From<mixup::Error> for ClusterError {
    fn from(err: mixup::Error) -> Self {
        match err {
            mixup::Error::Config(msg) => ClusterError::Config(msg),
            mixup::Error::FieldResolution(msg) => ClusterError::FieldResolution(msg),
            mixup::Error::InvalidRequest(msg) => ClusterError::InvalidRequest(msg),
            other => ClusterError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
