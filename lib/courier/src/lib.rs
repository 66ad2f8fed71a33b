//! Declarative HTTP client for Rust.
//!
//! Declare endpoints as trait methods, get a client that binds arguments,
//! resolves configuration, honours per-route rate limits, sends the request
//! and decodes the response. Both `async fn` and blocking `fn` declarations
//! are supported.
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[courier(base_url = "https://jsonplaceholder.typicode.com", timeout = 10)]
//! pub trait JsonPlaceholder {
//!     #[get("users/{user_id}")]
//!     #[rate_limit(max_calls = 5, interval = 1)]
//!     async fn get_user(&self, user_id: u64) -> courier::Result<User>;
//! }
//!
//! let client = JsonPlaceholderClient::builder().build()?;
//! let user = client.get_user(1).await?;
//! ```
//!
//! # Pipeline
//!
//! Every call goes through the same stages, in order: route lookup, argument
//! binding, configuration resolution, rate limiting, request assembly,
//! transport and response decoding. See [`call`] and [`call_blocking`].

mod api_client;
mod blocking;
mod client;
mod config;
mod connector;
mod dispatch;
pub mod middleware;
pub mod prelude;

pub use api_client::ApiClient;
pub use blocking::BlockingHyperClient;
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{TransportConfig, TransportConfigBuilder};
pub use connector::https_connector;
pub use dispatch::{call, call_blocking, default_blocking_client, default_client};

// Re-export tower for middleware composition
pub use tower;

pub use courier_core::{
    ArgValue, Args, Auth, BindingFault, BindingPlan, BlockingHttpClient, BoundBody, BoxError,
    CallContext, ClientConfig, ClientConfigBuilder, ConfigError, ContentType, Decoded,
    EffectiveConfig, Error, Form, HttpClient, Method, Param, ParamBinding, ParamRole, Part,
    PathTemplate, Prepared, Proxy, ProxyConfig, RateLimit, Request, RequestBuilder, Response,
    ResponseShape, Result, RouteBuilder, RouteDescriptor, RouteKey, RouteOptions, RouteRegistry,
    ShapeFault, Stage, TokenBucket, TransportError, ValidationError, assemble, bucket_for, decode,
    from_json, from_value, parse_base_url, parse_text, resolve, timeout_from_secs, to_json,
    to_value,
};

// Re-export crates for generated and user code
pub use serde_json;
pub use url;

pub use courier_macro::{courier, delete, get, head, http, options, patch, post, put};
