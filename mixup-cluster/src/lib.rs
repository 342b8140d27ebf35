//! Mixup Cluster - partition fan-out for grouping mixup
//!
//! A search index split into partitions cannot re-rank by group locally:
//! a group's hits may live on several partitions. The coordinator asks
//! every partition for its top hits, caps each answer at the configured
//! shard size, merges the answers into one global list and runs the
//! grouping re-rank on that.
//!
//! - **Source**: [`PartitionSource`] trait plus in-memory partitions
//! - **Federation**: scatter-gather with timeout and partial results
//! - **Merger**: score-order merge with id dedup

pub mod error;
pub mod federation;
pub mod metrics;
pub mod source;

pub use error::{ClusterError, Result};
pub use federation::{
    FederatedResponse, FederationConfig, MixupCoordinator, PartitionFailure, PartitionStatus,
    ResultMerger,
};
pub use source::{PartitionSource, StaticPartition, UnavailablePartition};
