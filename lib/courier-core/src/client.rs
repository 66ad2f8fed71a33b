//! Transport traits.
//!
//! The engine never opens a socket itself. It hands a finished [`Request`] to
//! a transport and gets a [`Response`] back:
//!
//! - [`HttpClient`] suspends the calling task
//! - [`BlockingHttpClient`] blocks the calling thread
//!
//! Both must honour [`Request::timeout`] and [`Request::proxy`], report an
//! elapsed timeout as [`Error::Timeout`](crate::Error::Timeout), and wrap any
//! other failure with [`Error::transport`](crate::Error::transport) without
//! altering it.

use std::future::Future;

use crate::{Request, Response, Result};

/// Suspending transport.
pub trait HttpClient: Send + Sync {
    /// Send the request and wait for the full response.
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Blocking transport.
pub trait BlockingHttpClient: Send + Sync {
    /// Send the request and block until the full response arrives.
    fn execute(&self, request: Request) -> Result<Response>;
}

impl<T: HttpClient> HttpClient for &T {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(request)
    }
}

impl<T: BlockingHttpClient> BlockingHttpClient for &T {
    fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request)
    }
}
