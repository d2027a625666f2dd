use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all mixtape metrics
const PREFIX: &str = "mixtape";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Pipeline Metrics
    pub static ref INGESTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ingestions_total"), "Track uploads by outcome"),
        &["outcome"]
    ).expect("Failed to create ingestions_total metric");

    pub static ref MERGES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_merges_total"), "Track merges by outcome"),
        &["outcome"]
    ).expect("Failed to create merges_total metric");

    pub static ref MERGE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_merge_duration_seconds"),
            "Time from merge submission to a terminal state"
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0])
    ).expect("Failed to create merge_duration_seconds metric");

    pub static ref ENGINE_JOBS_IN_FLIGHT: Gauge = Gauge::new(
        format!("{PREFIX}_engine_jobs_in_flight"),
        "Number of audio engine jobs currently running"
    ).expect("Failed to create engine_jobs_in_flight metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(INGESTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MERGES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MERGE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ENGINE_JOBS_IN_FLIGHT.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of a track upload ("ok", "extraction_failed", "storage_failed")
pub fn record_ingestion(outcome: &str) {
    INGESTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a merge reaching a terminal state
pub fn record_merge(outcome: &str, duration: Duration) {
    MERGES_TOTAL.with_label_values(&[outcome]).inc();
    MERGE_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn engine_job_started() {
    ENGINE_JOBS_IN_FLIGHT.inc();
}

pub fn engine_job_finished() {
    ENGINE_JOBS_IN_FLIGHT.dec();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
