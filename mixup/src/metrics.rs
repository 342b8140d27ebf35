//! Re-ranking metrics
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use crate::ranking::RerankStats;
use std::time::Duration;

/// Record a successful re-rank call
pub fn record_rerank(stats: &RerankStats, duration: Duration) {
    metrics::counter!("mixup_rerank_requests_total", "status" => "ok").increment(1);
    metrics::histogram!("mixup_rerank_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("mixup_rerank_window_size").record(stats.window as f64);
    metrics::histogram!("mixup_rerank_groups").record(stats.groups as f64);
}

/// Record a failed re-rank call
pub fn record_rerank_error(error_type: &str) {
    metrics::counter!("mixup_rerank_requests_total", "status" => "error").increment(1);
    metrics::counter!(
        "mixup_rerank_errors_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record that tail scores had to be shifted below the window
pub fn record_tail_shift() {
    metrics::counter!("mixup_rerank_tail_shifts_total").increment(1);
}

/// Record a partition truncated by the shard-size cap
pub fn record_partition_truncated(dropped: usize) {
    metrics::counter!("mixup_partition_truncations_total").increment(1);
    metrics::histogram!("mixup_partition_dropped_hits").record(dropped as f64);
}
