//! Partition fan-out metrics

use std::time::Duration;

/// Record one partition search
pub fn record_partition_request(partition: &str, status: &str, duration: Duration) {
    metrics::counter!(
        "mixup_partition_requests_total",
        "partition" => partition.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "mixup_partition_duration_seconds",
        "partition" => partition.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a response assembled from only part of the partitions
pub fn record_partial_response(failed: u32) {
    metrics::counter!("mixup_partial_responses_total").increment(1);
    metrics::histogram!("mixup_failed_partitions").record(failed as f64);
}

/// Record end-to-end federated request duration
pub fn record_federated_request(status: &str, duration: Duration) {
    metrics::counter!(
        "mixup_federated_requests_total",
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("mixup_federated_duration_seconds").record(duration.as_secs_f64());
}
