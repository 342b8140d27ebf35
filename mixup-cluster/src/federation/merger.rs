//! Merging partition hit lists into one global candidate list
//!
//! Each partition delivers a locally sorted, already limited list. The
//! merger concatenates them, restores the global score order, drops
//! duplicate ids (a replica answering twice keeps its best score) and cuts
//! the list to the coordinator fetch size. Totals are summed.

use mixup::candidate::score_order;
use mixup::Hits;
use std::collections::HashSet;

/// Result merger
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMerger;

impl ResultMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge partition results, keeping at most `limit` hits.
    pub fn merge(&self, partitions: Vec<Hits>, limit: usize) -> Hits {
        let total = partitions.iter().map(|p| p.total).sum();
        let mut all: Vec<_> = partitions.into_iter().flat_map(|p| p.hits).collect();

        all.sort_by(score_order);

        // Sorted best-first, so the first occurrence of an id is its best
        let mut seen = HashSet::with_capacity(all.len());
        all.retain(|hit| seen.insert(hit.id.clone()));
        all.truncate(limit);

        Hits::new(total, all)
    }
}
