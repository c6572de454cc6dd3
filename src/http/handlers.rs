//! Request handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};

use crate::http::server::AppState;
use crate::security::address::{resolve_address, ClientAddrs};

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// `GET /hello`: echo the caller's observed address(es).
pub async fn hello(addrs: ClientAddrs) -> String {
    resolve_address(&addrs)
}

/// `GET /api/monitor`: Prometheus exposition, or a JSON snapshot when the
/// caller accepts JSON. Reached only through the local-access guard.
pub async fn monitor(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if accepts_json(&headers) {
        return Json(state.stats.snapshot()).into_response();
    }

    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE))],
        state.metrics.render(),
    )
        .into_response()
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_accept() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_json(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html, application/json;q=0.9"));
        assert!(accepts_json(&headers));
    }

    #[tokio::test]
    async fn hello_echoes_resolved_address() {
        let body = hello(ClientAddrs::new("203.0.113.7", vec![])).await;
        assert_eq!(body, "203.0.113.7");
    }
}
