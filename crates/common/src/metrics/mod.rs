//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Metrics prefix for all Concierge metrics
pub const METRICS_PREFIX: &str = "concierge";

/// Histogram buckets for HTTP request latency (in seconds).
/// Agent requests wait on several LLM round trips, so the tail is long.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.025,  // 25ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Install the Prometheus exporter on `port` (0 disables it)
pub fn install_exporter(port: u16) -> crate::Result<()> {
    if port == 0 {
        tracing::debug!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            EMBEDDING_BUCKETS,
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
        })
        .and_then(|b| b.install())
        .map_err(|e| crate::AppError::Configuration {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Agent metrics
    describe_counter!(
        format!("{}_agent_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total agent runs by outcome"
    );

    describe_histogram!(
        format!("{}_agent_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Agent run latency in seconds"
    );

    describe_histogram!(
        format!("{}_agent_iterations", METRICS_PREFIX),
        Unit::Count,
        "Reasoning steps per agent run"
    );

    describe_counter!(
        format!("{}_tool_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total tool invocations"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval queries"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Chunks returned by the last retrieval"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total PDF pages ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Index build latency in seconds"
    );

    describe_gauge!(
        format!("{}_index_size", METRICS_PREFIX),
        Unit::Count,
        "Chunks held by the loaded vector index"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // LLM metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total completion requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Completion latency in seconds"
    );

    // Calendar metrics
    describe_counter!(
        format!("{}_calendar_events_total", METRICS_PREFIX),
        Unit::Count,
        "Calendar events created by outcome"
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

/// Helper to record agent run metrics
pub fn record_agent_run(duration_secs: f64, iterations: usize, outcome: &str) {
    counter!(
        format!("{}_agent_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_agent_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_agent_iterations", METRICS_PREFIX)).record(iterations as f64);
}

/// Helper to record a tool invocation
pub fn record_tool_call(tool: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_tool_calls_total", METRICS_PREFIX),
        "tool" => tool.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    counter!(format!("{}_retrieval_queries_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        tracing::trace!(model, batch_size, duration_secs, "Embedding batch complete");
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record completion metrics
pub fn record_llm(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, documents: usize, chunks_created: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(documents as u64);

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to publish the loaded index size
pub fn record_index_size(chunks: usize) {
    gauge!(format!("{}_index_size", METRICS_PREFIX)).set(chunks as f64);
}

/// Helper to record a calendar write
pub fn record_calendar_event(success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_calendar_events_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, EMBEDDING_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/agent");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_exporter_disabled_on_port_zero() {
        assert!(install_exporter(0).is_ok());
    }
}
