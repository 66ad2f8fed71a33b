//! Tower middleware layers for the hyper transport.
//!
//! Layers wrap the [`HyperClient`](crate::HyperClient) service, below the
//! dispatcher: they see every assembled [`Request`](crate::Request) after
//! binding, configuration and rate limiting have run. The last layer added
//! is the first to process requests.
//!
//! # Available Layers
//!
//! - [`LoggingLayer`] - logs exchanges using `tracing`
//! - [`RetryPolicy`] - retry policy for [`RetryLayer`]
//! - [`RetryLayer`] - retries failed requests based on a policy
//! - [`ConcurrencyLimitLayer`] - limits concurrent requests
//!
//! # Example
//!
//! ```ignore
//! use courier::HyperClient;
//! use courier::middleware::{ConcurrencyLimitLayer, LoggingLayer};
//!
//! let client = HyperClient::builder()
//!     .layer(ConcurrencyLimitLayer::new(4))
//!     .layer(LoggingLayer::debug())
//!     .with_retry(2)
//!     .build();
//! ```

mod logging;
mod retry;

pub use logging::{LogLevel, Logging, LoggingLayer};
pub use retry::RetryPolicy;

pub use tower::limit::ConcurrencyLimitLayer;
pub use tower::retry::RetryLayer;
pub use tower::{Layer, ServiceBuilder};
