//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ulink_requests_total` (counter): requests by method, path, status
//! - `ulink_request_duration_seconds` (histogram): latency by method, path
//! - `ulink_rate_limited_total` (counter): requests rejected by the limiter
//! - `ulink_access_denied_total` (counter): monitor requests from non-local peers
//!
//! The Prometheus recorder is process global. It is installed on first use
//! and every server in the process shares its handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder if needed and return its handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A metrics recorder is already installed; monitor output will be empty");
            }
            handle
        })
        .clone()
}

/// Counters backing the JSON monitor snapshot.
#[derive(Debug)]
pub struct RequestStats {
    started: Instant,
    requests_total: AtomicU64,
    rate_limited_total: AtomicU64,
    access_denied_total: AtomicU64,
}

/// Point-in-time view of [`RequestStats`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub version: &'static str,
    pub pid: u32,
    pub uptime_secs: u64,
    pub requests_total: u64,
    pub rate_limited_total: u64,
    pub access_denied_total: u64,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests_total: AtomicU64::new(0),
            rate_limited_total: AtomicU64::new(0),
            access_denied_total: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            version: env!("CARGO_PKG_VERSION"),
            pid: std::process::id(),
            uptime_secs: self.started.elapsed().as_secs(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            rate_limited_total: self.rate_limited_total.load(Ordering::Relaxed),
            access_denied_total: self.access_denied_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a completed request.
pub fn record_request(stats: &RequestStats, method: &str, path: &str, status: u16, start: Instant) {
    stats.requests_total.fetch_add(1, Ordering::Relaxed);

    metrics::histogram!(
        "ulink_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(start.elapsed().as_secs_f64());
    metrics::counter!(
        "ulink_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_rate_limited(stats: &RequestStats) {
    stats.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("ulink_rate_limited_total").increment(1);
}

pub fn record_access_denied(stats: &RequestStats) {
    stats.access_denied_total.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("ulink_access_denied_total").increment(1);
}

/// Middleware recording every request that reaches the router.
///
/// Routed requests are labelled with their route template; everything
/// served by the static fallback shares the `static` label.
pub async fn track_requests(
    State(stats): State<Arc<RequestStats>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "static".to_string());

    let response = next.run(request).await;
    record_request(&stats, &method, &path, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = RequestStats::new();
        record_request(&stats, "GET", "/hello", 200, Instant::now());
        record_request(&stats, "GET", "/hello", 429, Instant::now());
        record_rate_limited(&stats);
        record_access_denied(&stats);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.rate_limited_total, 1);
        assert_eq!(snapshot.access_denied_total, 1);
        assert_eq!(snapshot.pid, std::process::id());
    }

    #[test]
    fn recorder_handle_is_shared() {
        let _first = init_metrics();
        metrics::counter!("ulink_test_shared_total").increment(1);
        let second = init_metrics();
        assert!(second.render().contains("ulink_test_shared_total"));
    }
}
