//! Retry middleware for HTTP requests.

use std::future;

use tower::retry::Policy;

use crate::{Error, Request, Response};

/// A simple retry policy for HTTP requests.
///
/// Retries:
/// - transport errors and timeouts
/// - 5xx server errors
/// - 429 Too Many Requests
///
/// Retried requests do not take another rate-limit token: the limiter runs
/// once per declared call, above the transport.
///
/// # Example
///
/// ```ignore
/// use courier::HyperClient;
/// use courier::middleware::{RetryLayer, RetryPolicy};
///
/// let client = HyperClient::builder()
///     .layer(RetryLayer::new(RetryPolicy::new(3)))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    remaining: u32,
}

impl RetryPolicy {
    /// Create a new retry policy with the given maximum number of retries.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining: max_retries,
        }
    }

    fn should_retry_response(response: &Response) -> bool {
        let status = response.status();
        status >= 500 || status == 429
    }

    fn should_retry_error(error: &Error) -> bool {
        error.is_transport() || error.is_timeout()
    }
}

impl Policy<Request, Response, Error> for RetryPolicy {
    type Future = future::Ready<()>;

    fn retry(
        &mut self,
        _req: &mut Request,
        result: &mut Result<Response, Error>,
    ) -> Option<Self::Future> {
        if self.remaining == 0 {
            return None;
        }

        let should_retry = match result {
            Ok(response) => Self::should_retry_response(response),
            Err(error) => Self::should_retry_error(error),
        };

        should_retry.then(|| {
            self.remaining -= 1;
            future::ready(())
        })
    }

    fn clone_request(&mut self, req: &Request) -> Option<Request> {
        Some(req.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tower::{Layer, ServiceExt, service_fn};

    use super::*;
    use crate::middleware::RetryLayer;
    use crate::{Method, Stage};

    fn response(status: u16) -> Response {
        Response::new(status, Vec::<(String, String)>::new(), "")
    }

    #[test]
    fn should_retry_server_errors_and_throttling() {
        assert!(RetryPolicy::should_retry_response(&response(500)));
        assert!(RetryPolicy::should_retry_response(&response(503)));
        assert!(RetryPolicy::should_retry_response(&response(429)));
    }

    #[test]
    fn should_not_retry_other_responses() {
        assert!(!RetryPolicy::should_retry_response(&response(200)));
        assert!(!RetryPolicy::should_retry_response(&response(400)));
        assert!(!RetryPolicy::should_retry_response(&response(404)));
    }

    #[test]
    fn should_retry_transport_and_timeout_errors() {
        let refused = Error::transport(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(RetryPolicy::should_retry_error(&refused));
        assert!(RetryPolicy::should_retry_error(&Error::Timeout));
    }

    #[test]
    fn should_not_retry_validation_errors() {
        let error = Error::validation(Stage::Body, io::Error::other("bad body"));
        assert!(!RetryPolicy::should_retry_error(&error));
    }

    #[tokio::test]
    async fn retries_until_budget_is_spent() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let inner = service_fn(move |_request: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(response(503)) }
        });
        let service = RetryLayer::new(RetryPolicy::new(2)).layer(inner);

        let request = Request::builder(Method::Get, "http://localhost/flaky".parse().unwrap()).build();
        let result = service.oneshot(request).await.unwrap();

        assert_eq!(result.status(), 503);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
