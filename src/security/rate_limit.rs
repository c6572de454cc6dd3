//! Fixed-window rate limiting keyed on the caller.
//!
//! The key is the first forwarded address when present, otherwise the peer
//! address. Behind an untrusted network that key is caller controlled, which
//! only affects fairness, never authorization.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::address::ClientAddrs;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Requests seen for one key in the current window.
#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

impl Verdict {
    /// Seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        self.reset_after.as_millis().div_ceil(1000) as u64
    }

    fn apply_headers(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(self.reset_secs()));
    }
}

/// Per-key fixed-window counter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Count a request for `key` and report whether it fits the window.
    pub fn check(&self, key: &str) -> Verdict {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Verdict {
        let mut window = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        let reset_after = self.window.saturating_sub(now.duration_since(window.started));
        let allowed = window.count < self.max_requests;
        if allowed {
            window.count += 1;
        }

        Verdict {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_after,
        }
    }

    /// Drop windows that have already closed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Middleware applying the configured limiter.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    addrs: ClientAddrs,
    request: Request<Body>,
    next: Next,
) -> Response {
    let runtime = state.runtime();
    if !runtime.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let verdict = runtime.limiter.check(addrs.rate_limit_key());
    if !verdict.allowed {
        tracing::warn!(client = %addrs.rate_limit_key(), "Rate limit exceeded");
        metrics::record_rate_limited(&state.stats);

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, verdict.reset_secs().to_string())],
            "Too Many Requests",
        )
            .into_response();
        verdict.apply_headers(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    verdict.apply_headers(&mut response);
    response
}
