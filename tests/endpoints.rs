//! End-to-end tests over a real loopback listener.

use std::time::Duration;

use axum::http::StatusCode;
use ulink::config::EdgeConfig;

mod common;

#[tokio::test]
async fn hello_over_tcp_reports_loopback_peer() {
    let server = common::start_server(EdgeConfig::default()).await;

    let res = common::client()
        .get(server.url("/hello"))
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "127.0.0.1");
}

#[tokio::test]
async fn hello_over_tcp_echoes_forwarded_chain() {
    let server = common::start_server(EdgeConfig::default()).await;

    let res = common::client()
        .get(server.url("/hello"))
        .header("X-Forwarded-For", "203.0.113.7, 198.51.100.2")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "203.0.113.7 198.51.100.2");
}

#[tokio::test]
async fn monitor_over_tcp_is_served_to_loopback() {
    let server = common::start_server(EdgeConfig::default()).await;
    let client = common::client();

    // Generate at least one recorded request first.
    client.get(server.url("/hello")).send().await.unwrap();

    let res = client.get(server.url("/api/monitor")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("ulink_requests_total"));
}

#[tokio::test]
async fn second_hello_within_window_is_limited() {
    let server = common::start_server(EdgeConfig::default()).await;
    let client = common::client();

    let first = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn reload_disables_rate_limit_and_locks_monitor() {
    let server = common::start_server(EdgeConfig::default()).await;
    let client = common::client();

    let mut updated = EdgeConfig::default();
    updated.rate_limit.enabled = false;
    updated.monitor.trusted_addresses = vec!["10.0.0.0/8".into()];
    server.config_updates.send(updated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    for _ in 0..3 {
        let res = client.get(server.url("/hello")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(server.url("/api/monitor")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let server = common::start_server(EdgeConfig::default()).await;
    let url = server.url("/");
    let client = common::client();

    assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);

    server.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(client.get(&url).send().await.is_err());
}
