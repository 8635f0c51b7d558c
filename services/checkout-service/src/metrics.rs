//! Prometheus metrics exposition
//!
//! The library crates emit their own counters through the `metrics` facade
//! (`sky_auth_token_requests_total`, `payments_api_requests_total`,
//! `payments_api_refresh_retries_total`). This module installs the recorder
//! that collects them and adds the per-route HTTP metrics:
//!
//! - `checkout_http_requests_total` (counter): labels `route`, `status`
//! - `checkout_http_request_duration_seconds` (histogram): label `route`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "checkout_http_request_duration_seconds";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Bucket boundaries run from 5ms to 30s, the default outbound timeout, so
/// a page that waited on a slow Sky API call still lands in a finite bucket.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;
    Ok(handle)
}

/// Record a completed request against its matched route template.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "checkout_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

#[cfg(test)]
pub(crate) fn test_recorder() -> metrics_exporter_prometheus::PrometheusRecorder {
    builder()
        .expect("failed to set histogram buckets")
        .build_recorder()
}
