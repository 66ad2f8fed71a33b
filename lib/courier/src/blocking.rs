//! Blocking transport.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{BlockingHttpClient, Error, HttpClient, HyperClient, Request, Response, Result};

/// Blocking HTTP transport.
///
/// Drives a [`HyperClient`] on a private single-threaded runtime, so the
/// calling thread blocks until the response is complete. Clones share the
/// runtime and the connection pools.
///
/// Calling it from inside an async runtime panics, like any nested
/// `block_on`; use [`HyperClient`] there.
///
/// # Example
///
/// ```ignore
/// use courier::{BlockingHyperClient, HyperClient};
///
/// let client = BlockingHyperClient::with_client(HyperClient::builder().with_logging().build())?;
/// ```
#[derive(Debug, Clone)]
pub struct BlockingHyperClient {
    client: HyperClient,
    runtime: Arc<Runtime>,
}

impl BlockingHyperClient {
    /// Create a blocking client over a default [`HyperClient`].
    pub fn new() -> Result<Self> {
        Self::with_client(HyperClient::new())
    }

    /// Create a blocking client over `client`.
    pub fn with_client(client: HyperClient) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::transport)?;
        Ok(Self {
            client,
            runtime: Arc::new(runtime),
        })
    }

    /// The underlying suspending client.
    #[must_use]
    pub const fn client(&self) -> &HyperClient {
        &self.client
    }
}

impl BlockingHttpClient for BlockingHyperClient {
    fn execute(&self, request: Request) -> Result<Response> {
        self.runtime.block_on(self.client.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let client = BlockingHyperClient::new().unwrap();
        let request = Request::builder(Method::Get, "http://127.0.0.1:9/".parse().unwrap()).build();

        let err = client.execute(request).unwrap_err();
        assert!(err.is_transport(), "{err:?}");
    }

    #[test]
    fn clones_share_the_runtime() {
        let client = BlockingHyperClient::new().unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(&client.runtime, &clone.runtime));
    }
}
