//! Partition limiter
//!
//! Caps how many hits one partition (shard) hands to the merge step, so
//! the coordinator-level window stays bounded whatever the fan-out degree.

use crate::candidate::Candidate;
use crate::metrics;

/// Keep the first `shard_size` hits of a locally sorted partition list.
///
/// Order and scores are unchanged; a shorter list passes through as is.
pub fn limit_partition(mut hits: Vec<Candidate>, shard_size: usize) -> Vec<Candidate> {
    if hits.len() > shard_size {
        metrics::record_partition_truncated(hits.len() - shard_size);
        hits.truncate(shard_size);
    }
    hits
}
