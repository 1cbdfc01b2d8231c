//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SONAR deposit metrics
pub const METRICS_PREFIX: &str = "sonar_deposit";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 100ms, P99 < 1s
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms - P50 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s - P99 target
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for file uploads (large files take minutes)
pub const UPLOAD_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    15.00,  // 15s
    60.00,  // 1min
    300.0,  // 5min
    900.0,  // 15min
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Backend metrics
    describe_counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total SONAR backend calls"
    );

    describe_histogram!(
        format!("{}_backend_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "SONAR backend call latency in seconds"
    );

    // Upload metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total uploaded files by outcome"
    );

    describe_counter!(
        format!("{}_uploaded_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total bytes uploaded"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Single file upload latency in seconds"
    );

    // Import metrics
    describe_counter!(
        format!("{}_imports_total", METRICS_PREFIX),
        Unit::Count,
        "Total metadata imports by source"
    );

    // Deposit metrics
    describe_counter!(
        format!("{}_deposit_saves_total", METRICS_PREFIX),
        Unit::Count,
        "Total deposit step saves"
    );

    describe_counter!(
        format!("{}_deposits_published_total", METRICS_PREFIX),
        Unit::Count,
        "Total deposits submitted for validation"
    );

    // File list metrics
    describe_histogram!(
        format!("{}_reconciled_files", METRICS_PREFIX),
        Unit::Count,
        "Number of head files after reconciliation"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Helper to record backend call metrics
pub fn record_backend_call(operation: &'static str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        "operation" => operation,
        "status" => outcome(success)
    )
    .increment(1);

    histogram!(
        format!("{}_backend_duration_seconds", METRICS_PREFIX),
        "operation" => operation
    )
    .record(duration_secs);
}

/// Helper to record a single file upload
pub fn record_upload(duration_secs: f64, bytes: u64, success: bool) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "status" => outcome(success)
    )
    .increment(1);

    if success {
        counter!(format!("{}_uploaded_bytes_total", METRICS_PREFIX)).increment(bytes);
        histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}

/// Helper to record files dropped from a selection before upload
pub fn record_rejected_uploads(reason: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "status" => reason
    )
    .increment(count as u64);
}

/// Helper to record a metadata import
pub fn record_import(source: &'static str, found: bool) {
    counter!(
        format!("{}_imports_total", METRICS_PREFIX),
        "source" => source,
        "found" => found.to_string()
    )
    .increment(1);
}

/// Helper to record a step save
pub fn record_save(step: &str, advanced: bool) {
    counter!(
        format!("{}_deposit_saves_total", METRICS_PREFIX),
        "step" => step.to_string(),
        "advanced" => advanced.to_string()
    )
    .increment(1);
}

pub fn record_publish() {
    counter!(format!("{}_deposits_published_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record the size of a reconciled file list
pub fn record_reconciliation(files: usize) {
    histogram!(format!("{}_reconciled_files", METRICS_PREFIX)).record(files as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, UPLOAD_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }

        // P50 target (100ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.100));
        // P99 target (1s) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&1.000));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("PUT", "/api/deposits/:pid/steps/:step");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_helpers_without_recorder() {
        record_backend_call("get_deposit", 0.01, true);
        record_upload(0.5, 1024, true);
        record_rejected_uploads("duplicate", 0);
        record_import("swisscovery", false);
        record_save("metadata", true);
        record_publish();
        record_reconciliation(3);
    }
}
