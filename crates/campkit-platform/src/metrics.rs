//! Platform API client metrics.

use metrics::counter;

/// Record a completed request against an endpoint.
pub(crate) fn record_request(endpoint: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("campkit_platform_requests_total", "endpoint" => endpoint, "outcome" => outcome)
        .increment(1);
}

/// Record a retry against an endpoint.
pub(crate) fn record_retry(endpoint: &'static str) {
    counter!("campkit_platform_retries_total", "endpoint" => endpoint).increment(1);
}
