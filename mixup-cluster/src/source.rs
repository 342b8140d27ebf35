//! Partition sources
//!
//! A partition is anything that can return its best `size` candidates in
//! score order: a local index shard, a remote node, a fixture file.

use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use mixup::candidate::score_order;
use mixup::Hits;

#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// Stable identifier used in logs, metrics and failure reports
    fn id(&self) -> &str;

    /// Return up to `size` hits sorted by score descending, id ascending.
    /// `total` is the partition's own match count.
    async fn search(&self, size: usize) -> Result<Hits>;
}

/// Partition backed by an in-memory hit list
#[derive(Debug, Clone)]
pub struct StaticPartition {
    id: String,
    hits: Hits,
}

impl StaticPartition {
    pub fn new(id: impl Into<String>, mut hits: Hits) -> Self {
        hits.hits.sort_by(score_order);
        Self { id: id.into(), hits }
    }
}

#[async_trait]
impl PartitionSource for StaticPartition {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, size: usize) -> Result<Hits> {
        let hits = self.hits.hits.iter().take(size).cloned().collect();
        Ok(Hits::new(self.hits.total, hits))
    }
}

/// Partition that always fails; stands in for an unreachable node
#[derive(Debug, Clone)]
pub struct UnavailablePartition {
    id: String,
    reason: String,
}

impl UnavailablePartition {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PartitionSource for UnavailablePartition {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, _size: usize) -> Result<Hits> {
        Err(ClusterError::Partition(format!(
            "partition {} unavailable: {}",
            self.id, self.reason
        )))
    }
}
