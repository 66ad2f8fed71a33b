//! Call dispatch.
//!
//! A declared method runs the same pipeline in both modes:
//!
//! 1. bind the arguments and resolve the configuration
//! 2. take a token from the route's rate limiter, waiting if needed
//! 3. assemble the request
//! 4. hand it to the transport
//! 5. decode the response into the declared shape
//!
//! Only the waiting differs: [`call`] suspends the task, [`call_blocking`]
//! blocks the thread. A failure at any stage ends the call, and nothing is
//! sent once a failure occurs before the transport.

use std::io;
use std::sync::LazyLock;

use tracing::{Instrument, Span, debug, info_span, warn};

use crate::{
    Args, BlockingHttpClient, BlockingHyperClient, ClientConfig, Decoded, Error, HttpClient,
    HyperClient, Result, RouteDescriptor, TokenBucket, decode,
};

/// Run a declared call on a suspending transport.
///
/// `config` is the client instance configuration, `None` for standalone
/// routes.
pub async fn call<C: HttpClient>(
    route: &RouteDescriptor,
    transport: &C,
    config: Option<&ClientConfig>,
    args: Args,
) -> Result<Decoded> {
    async move {
        let result = run(route, transport, config, args).await;
        log_failure(&result);
        result
    }
    .instrument(call_span(route))
    .await
}

/// Run a declared call on a blocking transport.
pub fn call_blocking<C: BlockingHttpClient>(
    route: &RouteDescriptor,
    transport: &C,
    config: Option<&ClientConfig>,
    args: Args,
) -> Result<Decoded> {
    let span = call_span(route);
    let _entered = span.enter();

    let result = run_blocking(route, transport, config, args);
    log_failure(&result);
    result
}

fn call_span(route: &RouteDescriptor) -> Span {
    info_span!(
        "http_call",
        route = route.name(),
        method = %route.method(),
        template = %route.template(),
    )
}

fn log_failure(result: &Result<Decoded>) {
    if let Err(err) = result {
        warn!(error = %err, "call failed");
    }
}

async fn run<C: HttpClient>(
    route: &RouteDescriptor,
    transport: &C,
    config: Option<&ClientConfig>,
    args: Args,
) -> Result<Decoded> {
    let prepared = route.prepare(config, args)?;
    if let Some(bucket) = route.limiter() {
        acquire(bucket).await;
    }
    let request = prepared.assemble()?;
    let timeout = request.timeout();

    let exchange = transport.execute(request);
    let response = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)??,
        None => exchange.await?,
    };

    debug!(status = response.status(), "response received");
    decode(route.shape(), response)
}

fn run_blocking<C: BlockingHttpClient>(
    route: &RouteDescriptor,
    transport: &C,
    config: Option<&ClientConfig>,
    args: Args,
) -> Result<Decoded> {
    let prepared = route.prepare(config, args)?;
    if let Some(bucket) = route.limiter() {
        bucket.acquire_blocking();
    }
    let request = prepared.assemble()?;

    let response = transport.execute(request)?;
    debug!(status = response.status(), "response received");
    decode(route.shape(), response)
}

/// Take one token, sleeping on the tokio clock while the bucket is empty.
///
/// Dropping the future while it sleeps consumes nothing.
async fn acquire(bucket: &TokenBucket) {
    loop {
        match bucket.try_acquire_at(tokio::time::Instant::now().into_std()) {
            Ok(()) => return,
            Err(wait) => {
                debug!(?wait, "rate limited, waiting for a token");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Suspending transport shared by standalone routes.
#[must_use]
pub fn default_client() -> &'static HyperClient {
    static CLIENT: LazyLock<HyperClient> = LazyLock::new(HyperClient::new);
    &CLIENT
}

/// Blocking transport shared by standalone routes.
///
/// Fails when its runtime cannot be started.
pub fn default_blocking_client() -> Result<&'static BlockingHyperClient> {
    static CLIENT: LazyLock<Result<BlockingHyperClient>> = LazyLock::new(BlockingHyperClient::new);
    CLIENT
        .as_ref()
        .map_err(|err| Error::transport(io::Error::other(err.to_string())))
}
