//! Prometheus metrics for the Rampart pipeline.
//!
//! Recording functions are safe to call before [`init_metrics`]; the
//! `metrics` facade drops observations when no recorder is installed.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `rampart_requests_total` | Counter | `request`, `outcome` |
//! | `rampart_request_duration_seconds` | Histogram | `request` |
//! | `rampart_slow_requests_total` | Counter | `request` |
//! | `rampart_cache_lookups_total` | Counter | `request`, `result` |
//! | `rampart_retries_total` | Counter | `request` |
//! | `rampart_circuit_transitions_total` | Counter | `request`, `state` |
//! | `rampart_rate_limited_total` | Counter | `request` |
//! | `rampart_timeouts_total` | Counter | `request` |
//! | `rampart_fallbacks_total` | Counter | `request` |
//! | `rampart_validation_failures_total` | Counter | `request` |
//!
//! Rendering is left to the host: call [`render_metrics`] from whatever
//! endpoint the application exposes.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder.
///
/// Calling this more than once is a no-op after the first success.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if another recorder is installed.
pub fn init_metrics() -> TelemetryResult<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "rampart_requests_total",
        "Requests that completed the pipeline, by outcome"
    );
    describe_histogram!(
        "rampart_request_duration_seconds",
        "Elapsed time spent in the pipeline"
    );
    describe_counter!(
        "rampart_slow_requests_total",
        "Requests that exceeded their performance threshold"
    );
    describe_counter!(
        "rampart_cache_lookups_total",
        "Cache lookups by result (hit or miss)"
    );
    describe_counter!("rampart_retries_total", "Retry attempts");
    describe_counter!(
        "rampart_circuit_transitions_total",
        "Circuit breaker state transitions"
    );
    describe_counter!(
        "rampart_rate_limited_total",
        "Requests rejected by the rate limiter"
    );
    describe_counter!("rampart_timeouts_total", "Requests that hit their deadline");
    describe_counter!(
        "rampart_fallbacks_total",
        "Failures answered by a fallback handler"
    );
    describe_counter!(
        "rampart_validation_failures_total",
        "Requests rejected by validators"
    );
}

/// Records a request that left the pipeline.
///
/// `outcome` is `"ok"` on success and the error category code otherwise.
pub fn record_request(request: &str, outcome: &str, duration: Duration) {
    counter!(
        "rampart_requests_total",
        "request" => request.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "rampart_request_duration_seconds",
        "request" => request.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a request that exceeded its performance threshold.
pub fn record_slow_request(request: &str) {
    counter!("rampart_slow_requests_total", "request" => request.to_string()).increment(1);
}

/// Records a cache lookup.
pub fn record_cache_lookup(request: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(
        "rampart_cache_lookups_total",
        "request" => request.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Records a retry attempt.
pub fn record_retry(request: &str) {
    counter!("rampart_retries_total", "request" => request.to_string()).increment(1);
}

/// Records a circuit state transition (`open`, `half_open`, `closed`).
pub fn record_circuit_transition(request: &str, state: &'static str) {
    counter!(
        "rampart_circuit_transitions_total",
        "request" => request.to_string(),
        "state" => state
    )
    .increment(1);
}

/// Records a rate limiter rejection.
pub fn record_rate_limited(request: &str) {
    counter!("rampart_rate_limited_total", "request" => request.to_string()).increment(1);
}

/// Records a timeout.
pub fn record_timeout(request: &str) {
    counter!("rampart_timeouts_total", "request" => request.to_string()).increment(1);
}

/// Records a fallback invocation.
pub fn record_fallback(request: &str) {
    counter!("rampart_fallbacks_total", "request" => request.to_string()).increment(1);
}

/// Records a validation rejection.
pub fn record_validation_failure(request: &str) {
    counter!("rampart_validation_failures_total", "request" => request.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_dont_panic() {
        record_request("GetCityListQuery", "ok", Duration::from_millis(10));
        record_slow_request("GetCityListQuery");
        record_cache_lookup("GetCityListQuery", true);
        record_cache_lookup("GetCityListQuery", false);
        record_retry("GetCityListQuery");
        record_circuit_transition("GetCityListQuery", "open");
        record_rate_limited("GetCityListQuery");
        record_timeout("GetCityListQuery");
        record_fallback("GetCityListQuery");
        record_validation_failure("CreateCityCommand");
    }

    #[test]
    fn test_render_after_init() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_retry("RenderQuery");
        let rendered = render_metrics().unwrap();
        assert!(rendered.contains("rampart_retries_total"));
    }
}
