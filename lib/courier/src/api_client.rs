//! Client instances.
//!
//! An [`ApiClient`] pairs a transport with one [`ClientConfig`]. Generated
//! clients wrap it; two clients built from the same trait share the routes
//! and their rate limiters but nothing else.

use std::sync::Arc;

use crate::dispatch::{call, call_blocking};
use crate::{Args, BlockingHttpClient, ClientConfig, Decoded, HttpClient, Result, RouteDescriptor};

/// A transport with its instance configuration.
///
/// # Example
///
/// ```ignore
/// use courier::{ApiClient, ClientConfig, HyperClient};
///
/// let http = HyperClient::builder().with_retry(3).build();
///
/// let github = ApiClient::new(http.clone(), ClientConfig::builder().base_url("https://api.github.com").build()?);
/// let gitlab = ApiClient::new(http, ClientConfig::builder().base_url("https://gitlab.com/api/v4").build()?);
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient<C> {
    transport: C,
    config: Arc<ClientConfig>,
}

impl<C> ApiClient<C> {
    /// Pair `transport` with `config`.
    #[must_use]
    pub fn new(transport: C, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// The instance configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &C {
        &self.transport
    }

    /// Consume the client and return the transport.
    #[must_use]
    pub fn into_transport(self) -> C {
        self.transport
    }
}

impl<C: HttpClient> ApiClient<C> {
    /// Call `route` with this instance's configuration.
    pub async fn call(&self, route: &RouteDescriptor, args: Args) -> Result<Decoded> {
        call(route, &self.transport, Some(&*self.config), args).await
    }
}

impl<C: BlockingHttpClient> ApiClient<C> {
    /// Call `route` with this instance's configuration, blocking the thread.
    pub fn call_blocking(&self, route: &RouteDescriptor, args: Args) -> Result<Decoded> {
        call_blocking(route, &self.transport, Some(&*self.config), args)
    }
}
