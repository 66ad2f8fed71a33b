//! Declared blocking clients.
//!
//! The mock server runs on its own runtime; the clients block the test
//! thread.

use std::time::{Duration, Instant};

use assert2::{check, let_assert};
use courier::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[courier(timeout = 5)]
pub trait Directory {
    #[get("users/{user_id}")]
    fn get_user(&self, user_id: u64) -> courier::Result<User>;

    #[post("users")]
    fn create(&self, #[field] name: &str, #[field] job: &str) -> courier::Result<serde_json::Map<String, serde_json::Value>>;

    #[get("users/{user_id}")]
    #[rate_limit(max_calls = 1, interval = 1)]
    fn limited_user(&self, user_id: u64) -> courier::Result<User>;

    #[get("slow", timeout = 0.2)]
    fn slow(&self) -> courier::Result<()>;
}

fn start_server(runtime: &Runtime) -> MockServer {
    runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Leanne Graham"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_json(json!({"name": "morpheus", "job": "leader"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "name": "morpheus",
                "job": "leader",
                "id": "7",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        server
    })
}

#[test]
fn blocking_get_and_post() {
    let runtime = Runtime::new().expect("runtime");
    let server = start_server(&runtime);
    let client = DirectoryClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client");

    let user = client.get_user(1).expect("user");
    check!(user.id == 1);
    check!(user.name == "Leanne Graham");

    let created = client.create("morpheus", "leader").expect("created");
    check!(created["id"] == "7");
}

#[test]
fn blocking_rate_limit_spaces_calls() {
    let runtime = Runtime::new().expect("runtime");
    let server = start_server(&runtime);
    let client = DirectoryClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client");

    let start = Instant::now();
    for _ in 0..3 {
        client.limited_user(1).expect("user");
    }
    check!(start.elapsed() >= Duration::from_secs(2));
}

#[test]
fn blocking_timeout() {
    let runtime = Runtime::new().expect("runtime");
    let server = start_server(&runtime);
    let client = DirectoryClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client");

    let err = client.slow().expect_err("timeout");
    check!(err.is_timeout());
}

#[test]
fn blocking_connection_failure() {
    let client = DirectoryClient::builder()
        .base_url("http://127.0.0.1:9")
        .build()
        .expect("client");

    let err = client.get_user(1).expect_err("refused");
    let_assert!(Error::Transport(transport) = err);
    let_assert!(Some(hyper_err) = transport.downcast_ref::<hyper_util::client::legacy::Error>());
    check!(hyper_err.is_connect());
}

#[test]
fn blocking_client_over_custom_transport() {
    let runtime = Runtime::new().expect("runtime");
    let server = start_server(&runtime);
    let transport = BlockingHyperClient::with_client(HyperClient::builder().with_logging().build())
        .expect("transport");
    let client = DirectoryClient::builder()
        .base_url(server.uri())
        .build_with(transport)
        .expect("client");

    check!(client.get_user(1).expect("user").id == 1);
}
