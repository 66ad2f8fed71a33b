//! Middleware stacked on `HyperClient`.

use std::time::Duration;

use assert2::check;
use courier::middleware::{ConcurrencyLimitLayer, LoggingLayer, RetryLayer, RetryPolicy};
use courier::prelude::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[courier(timeout = 5)]
pub trait Flaky {
    #[get("flaky")]
    async fn flaky(&self) -> courier::Result<serde_json::Map<String, serde_json::Value>>;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("courier=debug")
        .with_test_writer()
        .try_init();
}

async fn flaky_server(failures: u64) -> MockServer {
    let server = MockServer::start().await;
    if failures > 0 {
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(failures)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn retry_recovers_from_server_errors() {
    init_tracing();
    let server = flaky_server(2).await;

    let http = HyperClient::builder().with_logging().with_retry(3).build();
    let client = FlakyClient::builder()
        .base_url(server.uri())
        .build_with(http)
        .expect("client");

    let body = client.flaky().await.expect("recovered");
    check!(body["ok"] == true);
    check!(server.received_requests().await.expect("recording").len() == 3);
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let server = flaky_server(5).await;

    let http = HyperClient::builder()
        .layer(RetryLayer::new(RetryPolicy::new(1)))
        .build();
    let client = FlakyClient::builder()
        .base_url(server.uri())
        .build_with(http)
        .expect("client");

    let err = client.flaky().await.expect_err("still failing");
    check!(err.status() == Some(503));
    check!(server.received_requests().await.expect("recording").len() == 2);
}

#[tokio::test]
async fn stacked_layers() {
    init_tracing();
    let server = flaky_server(0).await;

    let http = HyperClient::builder()
        .timeout(Duration::from_secs(5))
        .layer(ConcurrencyLimitLayer::new(1))
        .layer(LoggingLayer::debug())
        .build();
    let client = FlakyClient::builder()
        .base_url(server.uri())
        .build_with(http)
        .expect("client");

    let (a, b) = tokio::join!(client.flaky(), client.flaky());
    check!(a.is_ok());
    check!(b.is_ok());
}
