//! Federate command implementation.

use crate::input;
use crate::settings::Settings;
use anyhow::{Context, Result};
use mixup::ranking::StoredFields;
use mixup_cluster::{MixupCoordinator, PartitionSource, StaticPartition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Treat each hit list file as one partition and run a federated mixup.
pub async fn run_federate(
    settings: &Settings,
    partition_paths: &[PathBuf],
    request_path: &Path,
    from: Option<usize>,
    size: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let request = input::read_request(request_path, &settings.mixup.defaults, from, size)?;

    let sources = partition_paths
        .iter()
        .map(|path| -> Result<Arc<dyn PartitionSource>> {
            let hits = input::read_hits(path)?;
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Partition file has no usable name")?
                .to_string();
            info!("Partition {}: {} hits", id, hits.len());
            Ok(Arc::new(StaticPartition::new(id, hits)) as Arc<dyn PartitionSource>)
        })
        .collect::<Result<Vec<_>>>()?;

    let coordinator = MixupCoordinator::new(sources, settings.federation.clone());
    let result = coordinator.search(&request, &StoredFields).await?;

    if result.is_partial {
        for failure in &result.partition_status.failures {
            warn!("Partition {} failed: {}", failure.partition_id, failure.reason);
        }
    }
    info!(
        "Merged {} partitions in {}ms, returning {} hits",
        result.partition_status.successful,
        result.latency_ms,
        result.response.hits.len()
    );

    input::write_output(&result, output)
}
