//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions.

use metrics::{describe_counter, describe_histogram, Unit};

/// Metrics prefix for all ArticleForge metrics
pub const METRICS_PREFIX: &str = "articleforge";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
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

    describe_counter!(
        format!("{}_ingests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of article ingest operations"
    );

    describe_counter!(
        format!("{}_publishes_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of article publish operations"
    );

    describe_counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of fragment merges"
    );

    describe_counter!(
        format!("{}_validation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Documents rejected by every schema version"
    );

    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound article-change notifications attempted"
    );
}

/// Increment a prefixed counter.
pub fn increment(name: &str) {
    metrics::counter!(format!("{}_{}", METRICS_PREFIX, name)).increment(1);
}
