//! Engine of the courier declarative HTTP client.
//!
//! This crate holds everything that does not touch the network:
//! - [`RouteBuilder`], [`RouteDescriptor`] and [`RouteRegistry`] - declared endpoints
//! - [`Param`], [`BindingPlan`], [`Args`] and [`CallContext`] - argument binding
//! - [`ClientConfig`] and [`resolve`] - configuration precedence
//! - [`TokenBucket`] - per-route rate limiting
//! - [`Request`] and [`assemble`] - request descriptors
//! - [`Response`], [`decode`] and [`Decoded`] - response decoding
//! - [`Error`] and [`Result`] - the error taxonomy
//! - [`HttpClient`] and [`BlockingHttpClient`] - the transport boundary
//!
//! The `courier` crate adds the hyper transports and the call dispatcher.

mod assemble;
mod binding;
mod body;
mod client;
mod config;
mod decode;
mod error;
mod method;
mod multipart;
mod path_template;
pub mod prelude;
mod rate_limit;
mod request;
mod response;
mod route;

pub use assemble::assemble;
pub use binding::{ArgValue, Args, BindingPlan, BoundBody, CallContext, Param, ParamBinding, ParamRole};
pub use body::{ContentType, from_json, from_value, parse_text, to_json, to_value};
pub use client::{BlockingHttpClient, HttpClient};
pub use config::{
    Auth, ClientConfig, ClientConfigBuilder, EffectiveConfig, Proxy, ProxyConfig, resolve,
    timeout_from_secs,
};
pub use decode::{Decoded, ResponseShape, decode};
pub use error::{
    BindingFault, BoxError, ConfigError, Error, Result, ShapeFault, Stage, TransportError,
    ValidationError,
};
pub use method::Method;
pub use multipart::{Form, Part};
pub use path_template::PathTemplate;
pub use rate_limit::{RateLimit, TokenBucket, bucket_for};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use route::{Prepared, RouteBuilder, RouteDescriptor, RouteKey, RouteOptions, RouteRegistry, parse_base_url};
