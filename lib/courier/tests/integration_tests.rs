//! Integration tests for `HyperClient` using wiremock.

use std::time::Duration;

use assert2::{check, let_assert};
use courier::{Error, HttpClient, HyperClient, Method, Proxy, Request, TransportConfig};
use serde::{Deserialize, Serialize};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn url(server: &MockServer, path: &str) -> url::Url {
    url::Url::parse(&format!("{}{path}", server.uri())).expect("url")
}

#[tokio::test]
async fn test_get_request() {
    let mock_server = MockServer::start().await;

    let user = User {
        id: 1,
        name: "Leanne Graham".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&user))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(Method::Get, url(&mock_server, "/users/1"))
        .header("Accept", "application/json")
        .build();

    let response = client.execute(request).await.expect("response");

    check!(response.status() == 200);
    let body: User = response.json().expect("json");
    check!(body == user);
}

#[tokio::test]
async fn test_post_request_with_json_body() {
    let mock_server = MockServer::start().await;

    let input = User {
        id: 0,
        name: "Bob".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(&input))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 42})))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(Method::Post, url(&mock_server, "/users"))
        .json(&input)
        .expect("json body")
        .build();

    let response = client.execute(request).await.expect("response");
    check!(response.status() == 201);
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-reason", "gone")
                .set_body_string("Not Found"),
        )
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(Method::Get, url(&mock_server, "/not-found")).build();

    let response = client.execute(request).await.expect("response");

    check!(!response.is_success());
    check!(response.status() == 404);
    check!(response.header("X-Reason") == Some("gone"));
    check!(response.body().as_ref() == b"Not Found");
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let request = Request::builder(Method::Get, url(&mock_server, "/slow"))
        .timeout(Some(Duration::from_millis(100)))
        .build();

    let err = client.execute(request).await.expect_err("timeout");
    check!(err.is_timeout());
}

#[tokio::test]
async fn test_transport_timeout_applies_without_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let client = HyperClient::with_config(
        TransportConfig::builder()
            .timeout(Duration::from_millis(100))
            .build(),
    );
    let request = Request::builder(Method::Get, url(&mock_server, "/slow")).build();

    let err = client.execute(request).await.expect_err("timeout");
    check!(err.is_timeout());
}

#[tokio::test]
async fn test_connection_refused_keeps_the_hyper_error() {
    let client = HyperClient::new();
    let request =
        Request::builder(Method::Get, url::Url::parse("http://127.0.0.1:9/").expect("url")).build();

    let err = client.execute(request).await.expect_err("refused");

    let_assert!(Error::Transport(transport) = err);
    let_assert!(Some(hyper_err) = transport.downcast_ref::<hyper_util::client::legacy::Error>());
    check!(hyper_err.is_connect());
}

#[tokio::test]
async fn test_unreachable_proxy_is_a_connect_error() {
    let mock_server = MockServer::start().await;

    let client = HyperClient::new();
    let request = Request::builder(Method::Get, url(&mock_server, "/users/1"))
        .proxy(Some(Proxy::from("http://127.0.0.1:9")))
        .build();

    let err = client.execute(request).await.expect_err("proxy refused");

    let_assert!(Some(transport) = err.as_transport());
    let_assert!(Some(hyper_err) = transport.downcast_ref::<hyper_util::client::legacy::Error>());
    check!(hyper_err.is_connect());
    // the proxy was used, not the target
    check!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_invalid_proxy_is_a_config_error() {
    let client = HyperClient::new();
    let request = Request::builder(Method::Get, url::Url::parse("http://localhost/").expect("url"))
        .proxy(Some(Proxy::from("not a proxy")))
        .build();

    let err = client.execute(request).await.expect_err("invalid proxy");
    check!(err.is_config());
}
