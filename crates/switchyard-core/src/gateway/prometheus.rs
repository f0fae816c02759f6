//! Prometheus metrics for gateway observability.
//!
//! - `switchyard_requests_total{provider,model,stream,status}` - Counter of chat requests
//! - `switchyard_request_duration_seconds{provider,model,stream}` - Histogram of request durations
//! - `switchyard_fallback_total{from_provider,to_provider}` - Counter of fallback redirects
//! - `switchyard_circuit_breaker_state{provider}` - Gauge (0 open, 0.5 half-open, 1 closed)
//! - `switchyard_circuit_breaker_rejections_total{provider}` - Counter of fast-failed calls
//! - `switchyard_rpm_rejections_total` - Counter of per-minute rate limit rejections
//! - `switchyard_quota_operations_total{operation}` - Counter of quota checks, updates, resets
//! - `switchyard_uptime_seconds` - Gauge of gateway uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};
use crate::gateway::circuit_breaker::CircuitState;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Histogram buckets for LLM latency.
///
/// Short prompts land under a second; long generations run tens of seconds.
const LLM_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Install the Prometheus recorder.
///
/// Safe to call repeatedly; later calls return the first handle.
pub fn init_metrics() -> AppResult<PrometheusHandle> {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);

    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(LLM_LATENCY_BUCKETS)
        .map_err(|e| AppError::Metrics(e.to_string()))?
        .install_recorder()
        .map_err(|e| AppError::Metrics(e.to_string()))?;

    describe_counter!("switchyard_requests_total", "Total number of chat requests processed");
    describe_histogram!("switchyard_request_duration_seconds", "Request duration in seconds");
    describe_counter!("switchyard_fallback_total", "Requests redirected to a fallback model");
    describe_gauge!(
        "switchyard_circuit_breaker_state",
        "Breaker state per provider (0 open, 0.5 half-open, 1 closed)"
    );
    describe_counter!(
        "switchyard_circuit_breaker_rejections_total",
        "Calls refused locally by an open breaker"
    );
    describe_counter!("switchyard_rpm_rejections_total", "Requests rejected by the RPM gate");
    describe_counter!("switchyard_quota_operations_total", "Daily quota operations by kind");
    describe_gauge!("switchyard_uptime_seconds", "Gateway uptime in seconds");

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Outcome label for request metrics.
pub fn status_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

/// Record a finished chat request.
pub fn record_request(provider: &str, model: &str, stream: bool, status: &str, duration: Duration) {
    let stream = if stream { "true" } else { "false" };
    let labels = [
        ("provider", provider.to_string()),
        ("model", model.to_string()),
        ("stream", stream.to_string()),
        ("status", status.to_string()),
    ];
    counter!("switchyard_requests_total", &labels).increment(1);

    let timing_labels = [
        ("provider", provider.to_string()),
        ("model", model.to_string()),
        ("stream", stream.to_string()),
    ];
    histogram!("switchyard_request_duration_seconds", &timing_labels)
        .record(duration.as_secs_f64());
}

pub fn record_fallback(from_provider: &str, to_provider: &str) {
    let labels =
        [("from_provider", from_provider.to_string()), ("to_provider", to_provider.to_string())];
    counter!("switchyard_fallback_total", &labels).increment(1);
}

pub fn update_circuit_state(provider: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Open => 0.0,
        CircuitState::HalfOpen => 0.5,
        CircuitState::Closed => 1.0,
    };
    let labels = [("provider", provider.to_string())];
    gauge!("switchyard_circuit_breaker_state", &labels).set(value);
}

pub fn record_circuit_rejection(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!("switchyard_circuit_breaker_rejections_total", &labels).increment(1);
}

pub fn record_rpm_rejection() {
    counter!("switchyard_rpm_rejections_total").increment(1);
}

pub fn record_quota_operation(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!("switchyard_quota_operations_total", &labels).increment(1);
}

fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("switchyard_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    if let Some(handle) = get_prometheus_handle() {
        handle.render()
    } else {
        String::from("# Metrics not initialized\n")
    }
}
