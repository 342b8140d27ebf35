//! Federated grouping mixup
//!
//! Scatter-gather over partition sources, followed by the coordinator-level
//! re-rank:
//!
//! ```text
//! Request → compile → [Partition 1, Partition 2, ...] → limit → Merger → Rerank → Page
//!                              ↓
//!                 Parallel execution with timeout
//!                              ↓
//!                 Partial results on failure
//! ```
//!
//! The mixup config is compiled before any partition is contacted, so a bad
//! request never costs a fan-out.

mod merger;

pub use merger::ResultMerger;

use crate::error::{ClusterError, Result};
use crate::metrics;
use crate::source::PartitionSource;
use mixup::ranking::FieldResolver;
use mixup::{limit_partition, DeclineRegistry, Hits, MixupRequest, MixupResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Federation configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FederationConfig {
    /// Allow returning partial results when some partitions fail
    #[serde(default = "default_allow_partial")]
    pub allow_partial_results: bool,

    /// How long to wait for one partition before counting it as failed
    #[serde(default = "default_partition_timeout")]
    pub partition_timeout_ms: u64,

    /// Minimum number of successful partitions required
    #[serde(default = "default_min_partitions")]
    pub min_successful_partitions: usize,

    /// Maximum concurrent partition requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_allow_partial() -> bool {
    true
}

fn default_partition_timeout() -> u64 {
    5000
}

fn default_min_partitions() -> usize {
    1
}

fn default_max_concurrent() -> usize {
    10
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            allow_partial_results: default_allow_partial(),
            partition_timeout_ms: default_partition_timeout(),
            min_successful_partitions: default_min_partitions(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

/// Status of partition execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub failures: Vec<PartitionFailure>,
}

impl PartitionStatus {
    /// Create a status for `total` partitions with nothing recorded yet
    pub fn new(total: u32) -> Self {
        Self {
            total,
            successful: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    /// Record a partition that answered
    pub fn record_success(&mut self) {
        self.successful += 1;
    }

    /// Record a partition that errored or timed out
    pub fn record_failure(&mut self, failure: PartitionFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Check if every partition answered
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Check if at least `min_partitions` succeeded
    pub fn has_minimum(&self, min_partitions: usize) -> bool {
        self.successful as usize >= min_partitions
    }
}

/// Details of a partition failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionFailure {
    pub partition_id: String,
    pub reason: String,
    pub is_timeout: bool,
}

/// Federated mixup response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederatedResponse {
    #[serde(flatten)]
    pub response: MixupResponse,
    pub latency_ms: u64,
    pub partition_status: PartitionStatus,
    pub is_partial: bool,
}

/// Fans a mixup request out to every partition and re-ranks the merged list
pub struct MixupCoordinator {
    sources: Vec<Arc<dyn PartitionSource>>,
    registry: Arc<DeclineRegistry>,
    config: FederationConfig,
    merger: ResultMerger,
    semaphore: Arc<Semaphore>,
}

impl MixupCoordinator {
    pub fn new(sources: Vec<Arc<dyn PartitionSource>>, config: FederationConfig) -> Self {
        Self::with_registry(sources, Arc::new(DeclineRegistry::new()), config)
    }

    /// Use a registry carrying custom decline functions
    pub fn with_registry(
        sources: Vec<Arc<dyn PartitionSource>>,
        registry: Arc<DeclineRegistry>,
        config: FederationConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            sources,
            registry,
            config,
            merger: ResultMerger::new(),
            semaphore,
        }
    }

    /// Number of partitions this coordinator fans out to
    pub fn partitions(&self) -> usize {
        self.sources.len()
    }

    /// Execute a federated mixup request.
    pub async fn search(
        &self,
        request: &MixupRequest,
        resolver: &(dyn FieldResolver + Sync),
    ) -> Result<FederatedResponse> {
        let start = Instant::now();
        let result = self.execute(request, resolver, start).await;

        let status = match &result {
            Ok(r) if r.is_partial => "partial",
            Ok(_) => "ok",
            Err(e) => e.error_type(),
        };
        metrics::record_federated_request(status, start.elapsed());
        result
    }

    async fn execute(
        &self,
        request: &MixupRequest,
        resolver: &(dyn FieldResolver + Sync),
        start: Instant,
    ) -> Result<FederatedResponse> {
        request.validate()?;
        let config = request.grouping_mixup.compile(&self.registry)?;
        let fetch_size = request.fetch_size();

        if self.sources.is_empty() {
            let response = request.execute(Hits::default(), &config, resolver)?;
            return Ok(FederatedResponse {
                response,
                latency_ms: start.elapsed().as_millis() as u64,
                partition_status: PartitionStatus::new(0),
                is_partial: false,
            });
        }

        debug!(
            "Scattering mixup request to {} partitions (fetch_size={}, shard_size={})",
            self.sources.len(),
            fetch_size,
            config.shard_size
        );
        let (partitions, partition_status) =
            self.scatter_gather(fetch_size, config.shard_size).await;

        if !self.config.allow_partial_results && !partition_status.all_succeeded() {
            let reasons: Vec<String> = partition_status
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.partition_id, f.reason))
                .collect();
            return Err(ClusterError::Partition(format!(
                "{} of {} partitions failed: {}",
                partition_status.failed,
                partition_status.total,
                reasons.join("; ")
            )));
        }

        if !partition_status.has_minimum(self.config.min_successful_partitions) {
            return Err(ClusterError::InsufficientPartitions(format!(
                "{} successful, {} required",
                partition_status.successful, self.config.min_successful_partitions
            )));
        }

        let merged = self.merger.merge(partitions, fetch_size);
        let response = request.execute(merged, &config, resolver)?;

        let is_partial = partition_status.failed > 0;
        if is_partial {
            warn!(
                "Federated mixup returned partial results: {}/{} partitions failed",
                partition_status.failed, partition_status.total
            );
            metrics::record_partial_response(partition_status.failed);
        }

        Ok(FederatedResponse {
            response,
            latency_ms: start.elapsed().as_millis() as u64,
            partition_status,
            is_partial,
        })
    }

    /// Ask each partition for `fetch_size` hits and cut every answer to
    /// `shard_size` before anything is merged.
    async fn scatter_gather(
        &self,
        fetch_size: usize,
        shard_size: usize,
    ) -> (Vec<Hits>, PartitionStatus) {
        let mut partition_status = PartitionStatus::new(self.sources.len() as u32);
        let timeout = Duration::from_millis(self.config.partition_timeout_ms);

        let futures: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let semaphore = Arc::clone(&self.semaphore);

                async move {
                    let started = Instant::now();
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            let err = ClusterError::Internal("partition semaphore closed".to_string());
                            return (source.id().to_string(), Err(err), started.elapsed());
                        }
                    };

                    let result = match tokio::time::timeout(timeout, source.search(fetch_size)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ClusterError::Timeout(format!(
                            "no answer within {}ms",
                            timeout.as_millis()
                        ))),
                    };
                    let result = result
                        .map(|hits| Hits::new(hits.total, limit_partition(hits.hits, shard_size)));

                    (source.id().to_string(), result, started.elapsed())
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        let mut partitions = Vec::with_capacity(results.len());
        for (partition_id, result, elapsed) in results {
            match result {
                Ok(hits) => {
                    debug!(
                        "Partition {} returned {} hits (total={})",
                        partition_id,
                        hits.len(),
                        hits.total
                    );
                    metrics::record_partition_request(&partition_id, "ok", elapsed);
                    partition_status.record_success();
                    partitions.push(hits);
                }
                Err(e) => {
                    warn!("Partition {} failed: {}", partition_id, e);
                    metrics::record_partition_request(&partition_id, e.error_type(), elapsed);
                    let is_timeout = matches!(e, ClusterError::Timeout(_));
                    partition_status.record_failure(PartitionFailure {
                        partition_id,
                        reason: e.to_string(),
                        is_timeout,
                    });
                }
            }
        }

        (partitions, partition_status)
    }
}
