//! Error types for courier.
//!
//! Every failure a call can produce lands in one of four families:
//!
//! - [`ConfigError`]: the route declaration itself is unusable. Raised when the
//!   route is registered (or on its first call) and returned again on every
//!   later call.
//! - [`ValidationError`]: an argument could not be interpreted, a body could not
//!   be parsed, or a response could not be decoded. Always carries the original
//!   failure as its cause.
//! - [`Error::Timeout`]: the resolved timeout elapsed before a response arrived.
//! - [`TransportError`]: whatever the transport returned, boxed but otherwise
//!   untouched.

use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use derive_more::{Display, Error, From};

use crate::ResponseShape;

/// Boxed error used for validation causes and transport failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ============================================================================
// Configuration errors
// ============================================================================

/// A route declaration that cannot be used.
///
/// Cloneable so a registry can hand the same failure back on every call.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ConfigError {
    /// The path template does not parse.
    #[display("malformed path template '{template}': {reason}")]
    MalformedTemplate {
        /// The offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A placeholder has no parameter binding.
    #[display("placeholder '{placeholder}' in '{template}' is not bound by any parameter")]
    UnboundPlaceholder {
        /// The route template.
        template: String,
        /// The placeholder name.
        placeholder: String,
    },

    /// A verb that is not one of the supported HTTP methods.
    #[display("unsupported HTTP method '{_0}'")]
    UnsupportedMethod(#[error(not(source))] String),

    /// A path binding targets a placeholder the template does not have.
    #[display("parameter '{param}' targets placeholder '{placeholder}' missing from '{template}'")]
    UnknownPlaceholder {
        /// The route template.
        template: String,
        /// The parameter name.
        param: String,
        /// The requested placeholder.
        placeholder: String,
    },

    /// Two parameters share a name.
    #[display("parameter '{_0}' is declared more than once")]
    DuplicateParam(#[error(not(source))] String),

    /// Body roles that cannot coexist on one route.
    #[display("conflicting body roles: {_0}")]
    ConflictingBody(#[error(not(source))] String),

    /// More than one timeout override parameter.
    #[display("at most one timeout override parameter is allowed")]
    DuplicateTimeout,

    /// No base URL from the route, the client or the standalone declaration.
    #[display("route '{_0}' has no base URL")]
    MissingBaseUrl(#[error(not(source))] String),

    /// A base URL that does not parse.
    #[display("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A proxy address that does not parse.
    #[display("invalid proxy '{proxy}': {reason}")]
    InvalidProxy {
        /// The rejected proxy.
        proxy: String,
        /// Parser message.
        reason: String,
    },

    /// A rate limit with zero calls or a zero interval.
    #[display("invalid rate limit: {_0}")]
    InvalidRateLimit(#[error(not(source))] String),

    /// A timeout that is negative, not a number or too large.
    #[display("invalid timeout: {_0}")]
    InvalidTimeout(#[error(not(source))] String),

    /// Lookup of a route name that was never registered.
    #[display("unknown route '{_0}'")]
    UnknownRoute(#[error(not(source))] String),

    /// The decoded shape does not match what the caller asked for.
    #[display("route decodes to {found}, not {expected}")]
    ShapeMismatch {
        /// Shape requested by the caller.
        expected: ResponseShape,
        /// Shape the route declares.
        found: ResponseShape,
    },
}

// ============================================================================
// Validation errors
// ============================================================================

/// The pipeline stage a validation error comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Stage {
    /// Turning call arguments into bound values.
    #[display("argument")]
    Binding,
    /// Encoding the request body.
    #[display("request body")]
    Body,
    /// Decoding the response.
    #[display("response")]
    Decode,
}

/// The single wrapped error for binding, parsing and decoding failures.
///
/// The original failure is kept as [`source`](StdError::source) and can be
/// recovered with [`ValidationError::downcast_cause`].
#[derive(Debug)]
pub struct ValidationError {
    stage: Stage,
    cause: BoxError,
}

impl ValidationError {
    /// Wrap a cause raised at `stage`.
    #[must_use]
    pub fn new(stage: Stage, cause: impl Into<BoxError>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Stage that failed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The original failure.
    #[must_use]
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// The original failure, if it has type `E`.
    #[must_use]
    pub fn downcast_cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause.downcast_ref::<E>()
    }

    /// Consume into the original failure.
    #[must_use]
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: {}", self.stage, self.cause)
    }
}

impl StdError for ValidationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Argument faults that have no underlying library error.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BindingFault {
    /// A required argument is absent and has no default.
    #[display("missing value for parameter '{_0}'")]
    Missing(#[error(not(source))] String),

    /// An argument that no parameter declares.
    #[display("unexpected argument '{_0}'")]
    Unexpected(#[error(not(source))] String),

    /// A value whose kind the role cannot accept.
    #[display("parameter '{param}' expects {expected}, got {found}")]
    Mismatch {
        /// The parameter name.
        param: String,
        /// Accepted kind.
        expected: &'static str,
        /// Supplied kind.
        found: &'static str,
    },
}

/// Response bodies that parse but have the wrong top-level kind.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("expected a JSON {expected}, got {found}")]
pub struct ShapeFault {
    /// Expected JSON kind.
    pub expected: &'static str,
    /// Received JSON kind.
    pub found: &'static str,
}

// ============================================================================
// Transport errors
// ============================================================================

/// A failure raised by the transport, kept as is.
#[derive(Debug)]
pub struct TransportError(BoxError);

impl TransportError {
    /// Wrap a transport failure.
    #[must_use]
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }

    /// The transport's own error.
    #[must_use]
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }

    /// The transport's own error, if it has type `E`.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Consume into the transport's own error.
    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The route cannot be used.
    #[display("configuration error: {_0}")]
    #[from]
    Config(ConfigError),

    /// An argument, body or response failed validation.
    #[display("{_0}")]
    #[from]
    Validation(ValidationError),

    /// The resolved timeout elapsed.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The transport failed.
    #[display("transport error: {_0}")]
    #[from]
    Transport(TransportError),

    /// A non-2xx response decoded into a structured shape.
    #[display("HTTP error {status}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        #[error(not(source))]
        body: Bytes,
    },

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Invalid request descriptor.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap a validation failure raised at `stage`.
    #[must_use]
    pub fn validation(stage: Stage, cause: impl Into<BoxError>) -> Self {
        Self::Validation(ValidationError::new(stage, cause))
    }

    /// Wrap a transport failure without altering it.
    #[must_use]
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(TransportError::new(err))
    }

    /// Create an HTTP error.
    #[must_use]
    pub fn http(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The wrapped validation error, if any.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// The wrapped transport error, if any.
    #[must_use]
    pub const fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns the response body if this is an HTTP error.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Try to decode the HTTP error body as JSON.
    ///
    /// Returns `None` when this is not an HTTP error.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.body().map(|body| crate::from_json(body))
    }
}
