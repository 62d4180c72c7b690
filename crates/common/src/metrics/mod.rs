//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Buckets for citation expansion latency (seconds). Expansions are dominated
/// by rate-limited upstream calls, so the range is wide.
pub const EXPANSION_BUCKETS: &[f64] = &[
    0.100,
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    30.00,
    60.00,
    120.0,
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
        format!("{}_tool_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total tool invocations by tool and outcome"
    );

    describe_counter!(
        format!("{}_expansions_total", METRICS_PREFIX),
        Unit::Count,
        "Total citation graph expansions by outcome"
    );

    describe_histogram!(
        format!("{}_expansion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Citation graph expansion latency in seconds"
    );

    describe_gauge!(
        format!("{}_expansion_nodes", METRICS_PREFIX),
        Unit::Count,
        "Number of nodes in the most recent citation graph"
    );

    describe_counter!(
        format!("{}_provider_lookups_total", METRICS_PREFIX),
        Unit::Count,
        "Total citation provider lookups by outcome"
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

/// Helper to record a tool invocation
pub fn record_tool_call(tool: &str, outcome: &str) {
    counter!(
        format!("{}_tool_calls_total", METRICS_PREFIX),
        "tool" => tool.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record a finished expansion
pub fn record_expansion(duration_secs: f64, depth: u32, outcome: &str, node_count: usize) {
    counter!(
        format!("{}_expansions_total", METRICS_PREFIX),
        "depth" => depth.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_expansion_duration_seconds", METRICS_PREFIX),
        "depth" => depth.to_string()
    )
    .record(duration_secs);

    if outcome == "success" {
        gauge!(format!("{}_expansion_nodes", METRICS_PREFIX)).set(node_count as f64);
    }
}

/// Helper to record a provider lookup
pub fn record_lookup(provider: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_provider_lookups_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
