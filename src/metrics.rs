/// Metrics and telemetry for the auth service
///
/// Prometheus-compatible counters for:
/// - HTTP request counts and latencies
/// - Challenge issuance and verification failures
/// - Sessions issued per login method
/// - Refresh outcomes

use axum::{extract::Request, middleware::Next, response::Response};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Auth Metrics ==========

    /// Two-factor challenges created and delivered
    pub static ref CHALLENGES_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "auth_challenges_issued_total",
        "Total number of two-factor challenges issued"
    )
    .unwrap();

    /// Failed challenge verifications by reason
    pub static ref CHALLENGE_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_challenge_failures_total",
        "Total number of failed two-factor verifications",
        &["reason"]
    )
    .unwrap();

    /// Sessions issued by login method
    pub static ref SESSIONS_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_sessions_issued_total",
        "Total number of sessions issued",
        &["method"]
    )
    .unwrap();

    /// Refresh attempts by outcome
    pub static ref REFRESH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_refresh_total",
        "Total number of refresh token exchanges",
        &["outcome"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a delivered challenge
pub fn record_challenge_issued() {
    CHALLENGES_ISSUED_TOTAL.inc();
}

/// Record a rejected code submission
pub fn record_challenge_failure(reason: &str) {
    CHALLENGE_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a session issued through `method` (two_factor, register, google, refresh)
pub fn record_session_issued(method: &str) {
    SESSIONS_ISSUED_TOTAL.with_label_values(&[method]).inc();
}

/// Record a refresh exchange outcome
pub fn record_refresh(outcome: &str) {
    REFRESH_TOTAL.with_label_values(&[outcome]).inc();
}

/// Middleware recording request counts and latencies
///
/// Uses the matched route template as the path label to keep cardinality bounded.
pub async fn track_http(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
