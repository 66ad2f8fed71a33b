//! Declared async clients against a mock server.

use std::time::{Duration, Instant};

use assert2::{check, let_assert};
use courier::prelude::*;
use courier::{ConfigError, Stage};
use serde_json::{Map, Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string_contains, header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[courier(timeout = 5)]
pub trait Users {
    #[get("users/{user_id}")]
    async fn get_user(&self, user_id: u64) -> courier::Result<User>;

    #[get("users")]
    async fn list_users(
        &self,
        #[query("_limit")]
        #[default(10)]
        limit: Option<u32>,
    ) -> courier::Result<Vec<User>>;

    #[get("users/{user_id}/posts")]
    async fn user_posts(&self, user_id: u64, tag: &str) -> courier::Result<Vec<Value>>;

    #[put("users/{user_id}")]
    async fn update(
        &self,
        user_id: u64,
        #[field] name: &str,
        #[field] job: &str,
    ) -> courier::Result<Map<String, Value>>;

    #[post("posts")]
    async fn create_post(
        &self,
        #[body] post: &NewPost<'_>,
        #[header("X-Request-Id")] request_id: &str,
    ) -> courier::Result<Map<String, Value>>;

    #[post("upload")]
    async fn upload(&self, #[files] files: Vec<(String, Vec<u8>)>) -> courier::Result<Response>;

    #[delete("users/{user_id}")]
    async fn remove(&self, user_id: u64) -> courier::Result<()>;

    #[get("missing")]
    async fn missing(&self) -> courier::Result<Response>;

    #[get("slow", timeout = 0.2)]
    async fn slow(&self) -> courier::Result<()>;

    #[get("slow")]
    async fn slow_with(&self, #[timeout] timeout: Duration) -> courier::Result<()>;

    #[get("users/{id}")]
    async fn broken(&self) -> courier::Result<User>;
}

async fn users(server: &MockServer) -> UsersClient {
    UsersClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client")
}

#[tokio::test]
async fn get_user_by_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "Leanne Graham",
            "username": "Bret",
        })))
        .mount(&server)
        .await;

    let user = users(&server).await.get_user(1).await.expect("user");
    check!(user.id == 1);
    check!(user.name == "Leanne Graham");
}

#[tokio::test]
async fn query_default_applies_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("_limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "a"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("_limit", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])),
        )
        .mount(&server)
        .await;

    let client = users(&server).await;
    check!(client.list_users(None).await.expect("default").len() == 1);
    check!(client.list_users(Some(2)).await.expect("explicit").len() == 2);
}

#[tokio::test]
async fn unmarked_value_is_sent_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3/posts"))
        .and(query_param("tag", "rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let posts = users(&server).await.user_posts(3, "rust").await.expect("posts");
    check!(posts.is_empty());
}

#[tokio::test]
async fn fields_build_a_json_object() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/2"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "morpheus", "job": "zion resident"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "morpheus",
            "job": "zion resident",
            "updatedAt": "2024-01-01T00:00:00Z",
        })))
        .mount(&server)
        .await;

    let updated = users(&server)
        .await
        .update(2, "morpheus", "zion resident")
        .await
        .expect("update");
    check!(updated["job"] == "zion resident");
}

#[tokio::test]
async fn body_and_header_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(header("x-request-id", "req-42"))
        .and(body_json(json!({"title": "foo", "body": "bar"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 101})))
        .mount(&server)
        .await;

    let post = NewPost {
        title: "foo",
        body: "bar",
    };
    let created = users(&server)
        .await
        .create_post(&post, "req-42")
        .await
        .expect("created");
    check!(created["id"] == 101);
}

#[tokio::test]
async fn files_are_sent_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"report.txt\""))
        .and(body_string_contains("quarterly numbers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .mount(&server)
        .await;

    let response = users(&server)
        .await
        .upload(vec![("report.txt".to_string(), b"quarterly numbers".to_vec())])
        .await
        .expect("upload");

    check!(response.status() == 200);
    let received = server.received_requests().await.expect("recording");
    let_assert!(Some(content_type) = received[0].headers.get("content-type"));
    check!(content_type.to_str().unwrap_or_default().starts_with("multipart/form-data"));
}

#[tokio::test]
async fn malformed_body_is_a_decode_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = users(&server).await.get_user(1).await.expect_err("invalid json");

    let_assert!(Error::Validation(validation) = err);
    check!(validation.stage() == Stage::Decode);
    check!(validation.to_string().contains("key must be a string"));
}

#[tokio::test]
async fn error_status_for_structured_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "no such user"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = users(&server).await;

    let err = client.get_user(404).await.expect_err("404");
    check!(err.is_not_found());
    let_assert!(Some(Ok(body)) = err.decode_body::<Map<String, Value>>());
    check!(body["error"] == "no such user");

    check!(client.remove(404).await.expect_err("404").status() == Some(404));
}

#[tokio::test]
async fn raw_shape_passes_any_status_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let response = users(&server).await.missing().await.expect("raw response");
    check!(response.status() == 503);
    check!(response.text() == Ok("maintenance"));
}

#[tokio::test]
async fn route_and_call_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = users(&server).await;
    check!(client.slow().await.expect_err("route timeout").is_timeout());
    check!(
        client
            .slow_with(Duration::from_millis(100))
            .await
            .expect_err("call timeout")
            .is_timeout()
    );
}

#[tokio::test]
async fn unbound_placeholder_is_a_config_error() {
    let server = MockServer::start().await;

    let err = users(&server).await.broken().await.expect_err("unbound");

    let_assert!(Error::Config(ConfigError::UnboundPlaceholder { placeholder, .. }) = err);
    check!(placeholder == "id");
    check!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn missing_base_url_is_a_config_error() {
    let client = UsersClient::builder().build().expect("client");

    let err = client.get_user(1).await.expect_err("no base url");
    let_assert!(Error::Config(ConfigError::MissingBaseUrl(_)) = err);
}

// ============================================================================
// Instances
// ============================================================================

#[courier]
pub trait Echo {
    #[get("echo")]
    async fn echo(&self) -> courier::Result<Response>;
}

#[tokio::test]
async fn instances_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo"))
        .and(header("x-client", "one"))
        .respond_with(ResponseTemplate::new(200).set_body_string("one"))
        .mount(&server)
        .await;

    let first = EchoClient::builder()
        .base_url(server.uri())
        .default_header("X-Client", "one")
        .build()
        .expect("first");
    let second = EchoClient::builder()
        .base_url("http://127.0.0.1:9")
        .default_header("X-Client", "two")
        .build()
        .expect("second");

    let (echoed, refused) = tokio::join!(first.echo(), second.echo());

    let response = echoed.expect("first echo");
    check!(response.text() == Ok("one"));

    let err = refused.expect_err("refused");
    let_assert!(Some(transport) = err.as_transport());
    let_assert!(Some(hyper_err) = transport.downcast_ref::<hyper_util::client::legacy::Error>());
    check!(hyper_err.is_connect());

    check!(first.config().default_headers()["x-client"] == "one");
    check!(second.config().default_headers()["x-client"] == "two");
}

// ============================================================================
// Configuration precedence
// ============================================================================

/// Records requests instead of sending them.
#[derive(Debug, Default)]
struct Recorder {
    sent: std::sync::Mutex<Vec<courier::Request>>,
}

impl Recorder {
    fn last(&self) -> courier::Request {
        self.sent
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .expect("a request")
    }
}

impl HttpClient for Recorder {
    async fn execute(&self, request: courier::Request) -> courier::Result<Response> {
        self.sent.lock().expect("lock").push(request);
        Ok(Response::new(204, Vec::<(String, String)>::new(), ""))
    }
}

#[courier(
    base_url = "https://api.example.com",
    proxies = "http://class-proxy.local:3128",
    timeout = 30
)]
pub trait Routed {
    #[get("plain")]
    async fn plain(&self) -> courier::Result<()>;

    #[get(
        "custom",
        base_url = "https://other.example.com/v2",
        proxies = "http://route-proxy.local:8080",
        timeout = 2
    )]
    async fn custom(&self) -> courier::Result<()>;

    #[get("per_call", timeout = 2)]
    async fn per_call(&self, #[timeout] timeout: Duration) -> courier::Result<()>;
}

#[tokio::test]
async fn configuration_precedence() {
    let recorder = Recorder::default();
    let client = RoutedClient::builder().build_with(&recorder).expect("client");

    client.plain().await.expect("plain");
    let request = recorder.last();
    check!(request.url().as_str() == "https://api.example.com/plain");
    check!(request.proxy() == Some(&Proxy::from("http://class-proxy.local:3128")));
    check!(request.timeout() == Some(Duration::from_secs(30)));

    client.custom().await.expect("custom");
    let request = recorder.last();
    check!(request.url().as_str() == "https://other.example.com/v2/custom");
    check!(request.proxy() == Some(&Proxy::from("http://route-proxy.local:8080")));
    check!(request.timeout() == Some(Duration::from_secs(2)));

    client.per_call(Duration::from_millis(500)).await.expect("per call");
    check!(recorder.last().timeout() == Some(Duration::from_millis(500)));
}

#[tokio::test]
async fn instance_settings_override_class_defaults() {
    let recorder = Recorder::default();
    let client = RoutedClient::builder()
        .base_url("https://staging.example.com/api")
        .proxy(ProxyConfig::new("http://instance-proxy.local:3128").expect("proxy").with_basic_auth("u", "p"))
        .timeout(Duration::from_secs(7))
        .auth(Auth::bearer("secret"))
        .build_with(&recorder)
        .expect("client");

    client.plain().await.expect("plain");
    let request = recorder.last();
    check!(request.url().as_str() == "https://staging.example.com/api/plain");
    check!(request.timeout() == Some(Duration::from_secs(7)));
    check!(request.header("authorization") == Some("Bearer secret"));
    let_assert!(Some(proxy) = request.proxy());
    check!(proxy.authorization() == Some("Basic dTpw".to_string()));

    // the route's own settings still win
    client.custom().await.expect("custom");
    let request = recorder.last();
    check!(request.url().as_str() == "https://other.example.com/v2/custom");
    check!(request.proxy() == Some(&Proxy::from("http://route-proxy.local:8080")));
}

#[courier(base_url = "https://api.example.com")]
pub trait Misdeclared {
    #[get("forever", timeout = 1e30)]
    async fn forever(&self) -> courier::Result<()>;

    #[get("backwards")]
    #[rate_limit(max_calls = 1, interval = -1)]
    async fn backwards(&self) -> courier::Result<()>;

    #[get("fine")]
    async fn fine(&self) -> courier::Result<()>;

    #[get("wait")]
    async fn wait(&self, #[timeout] seconds: f64) -> courier::Result<()>;
}

#[tokio::test]
async fn unusable_durations_fail_only_their_route() {
    let recorder = Recorder::default();
    let client = MisdeclaredClient::builder().build_with(&recorder).expect("client");

    let err = client.forever().await.expect_err("huge timeout");
    let_assert!(Error::Config(ConfigError::InvalidTimeout(_)) = err);

    let err = client.backwards().await.expect_err("negative interval");
    let_assert!(Error::Config(ConfigError::InvalidRateLimit(_)) = err);

    client.fine().await.expect("other routes still work");
    check!(recorder.last().url().as_str() == "https://api.example.com/fine");
}

#[tokio::test]
async fn huge_call_timeout_is_a_binding_error() {
    let recorder = Recorder::default();
    let client = MisdeclaredClient::builder().build_with(&recorder).expect("client");

    let err = client.wait(1e30).await.expect_err("overflowing timeout");
    let_assert!(Error::Validation(validation) = err);
    check!(validation.stage() == Stage::Binding);

    client.wait(0.25).await.expect("usable timeout");
    check!(recorder.last().timeout() == Some(Duration::from_millis(250)));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[courier(base_url = "https://limited.example.com")]
pub trait Limited {
    #[get("ping")]
    #[rate_limit(max_calls = 2, interval = 0.5)]
    async fn ping(&self) -> courier::Result<()>;

    #[get("free")]
    async fn free(&self) -> courier::Result<()>;
}

#[tokio::test]
async fn rate_limit_is_shared_by_instances() {
    let recorder = Recorder::default();
    let first = LimitedClient::builder().build_with(&recorder).expect("first");
    let second = LimitedClient::builder().build_with(&recorder).expect("second");

    let start = Instant::now();
    first.ping().await.expect("1");
    second.ping().await.expect("2");
    check!(start.elapsed() < Duration::from_millis(400));

    first.ping().await.expect("3");
    check!(start.elapsed() >= Duration::from_millis(450));

    let start = Instant::now();
    for _ in 0..10 {
        second.free().await.expect("free");
    }
    check!(start.elapsed() < Duration::from_millis(400));
}

// ============================================================================
// Standalone routes
// ============================================================================

// A standalone route's base URL is a literal in its declaration, so the mock
// server has to listen on this fixed address. Nothing else in the suite binds it.
const STANDALONE_ADDR: &str = "127.0.0.1:48761";

#[post("upload", base_url = "http://127.0.0.1:48761")]
async fn upload_parts(#[files] files: Vec<Part>) -> courier::Result<Response>;

#[http("GET users/{id}", base_url = "http://127.0.0.1:48761/")]
async fn fetch_user(id: u64) -> courier::Result<User>;

#[tokio::test]
async fn standalone_functions() {
    let listener = std::net::TcpListener::bind(STANDALONE_ADDR).expect("fixed port");
    let server = MockServer::builder().listener(listener).start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"notes.md\""))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Chelsey"})))
        .mount(&server)
        .await;

    let response = upload_parts(vec![Part::upload("notes.md", "# notes")])
        .await
        .expect("upload");
    check!(response.status() == 201);

    let user = fetch_user(5).await.expect("user");
    check!(user.name == "Chelsey");
}
