//! Client-instance configuration and per-call resolution.
//!
//! A [`ClientConfig`] belongs to exactly one client instance and never changes
//! after [`ClientConfigBuilder::build`]. For every call, [`resolve`] merges it
//! with the route's overrides and the call's bound values into an
//! [`EffectiveConfig`], highest precedence first:
//!
//! 1. per-call values (timeout override, header and query parameters)
//! 2. route options (timeout, base URL, proxy)
//! 3. client-instance defaults
//!
//! Header and query maps merge key by key: instance defaults first, per-call
//! values overwrite on collision.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;

use crate::route::parse_base_url;
use crate::{CallContext, ConfigError, Error, Result, RouteDescriptor};

// ============================================================================
// Proxy
// ============================================================================

/// A proxy with optional basic credentials.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct ProxyConfig {
    url: Url,
    username: Option<String>,
    #[debug("<redacted>")]
    password: Option<String>,
}

impl ProxyConfig {
    /// A proxy at `url`.
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_proxy_url(url)?,
            username: None,
            password: None,
        })
    }

    /// Authenticate against the proxy.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

/// A proxy setting in any of its accepted representations.
///
/// The representation is preserved through resolution; the transport
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    /// Textual address such as `http://proxy.local:3128`.
    Address(String),
    /// Structured proxy with credentials.
    Config(ProxyConfig),
    /// Parsed URL.
    Url(Url),
}

impl Proxy {
    /// Check that the proxy can be turned into a URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.url().map(drop)
    }

    /// Proxy URL, whatever the representation.
    pub fn url(&self) -> Result<Url, ConfigError> {
        match self {
            Self::Address(address) => parse_proxy_url(address),
            Self::Config(config) => Ok(config.url.clone()),
            Self::Url(url) => Ok(url.clone()),
        }
    }

    /// `Proxy-Authorization` header value, if credentials are known.
    ///
    /// Credentials come from a [`ProxyConfig`] or from the userinfo of a URL.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        match self {
            Self::Config(ProxyConfig {
                username: Some(username),
                password,
                ..
            }) => Some(basic_credentials(username, password.as_deref().unwrap_or_default())),
            Self::Config(_) => None,
            Self::Address(_) | Self::Url(_) => {
                let url = self.url().ok()?;
                (!url.username().is_empty())
                    .then(|| basic_credentials(url.username(), url.password().unwrap_or_default()))
            }
        }
    }
}

fn parse_proxy_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidProxy {
        proxy: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidProxy {
            proxy: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

impl From<&str> for Proxy {
    fn from(address: &str) -> Self {
        Self::Address(address.to_string())
    }
}

impl From<String> for Proxy {
    fn from(address: String) -> Self {
        Self::Address(address)
    }
}

impl From<Url> for Proxy {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<ProxyConfig> for Proxy {
    fn from(config: ProxyConfig) -> Self {
        Self::Config(config)
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Credentials sent as the `Authorization` header.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum Auth {
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        #[debug("<redacted>")]
        password: String,
    },
    /// Bearer token.
    Bearer(#[debug("<redacted>")] String),
}

impl Auth {
    /// Basic credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { username, password } => basic_credentials(username, password),
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

fn basic_credentials(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

// ============================================================================
// Client configuration
// ============================================================================

/// Configuration of one client instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    base_url: Option<Url>,
    default_headers: BTreeMap<String, String>,
    default_query: BTreeMap<String, String>,
    proxy: Option<Proxy>,
    auth: Option<Auth>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Base URL, normalized with a trailing `/`.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Default headers, names lower-cased.
    #[must_use]
    pub const fn default_headers(&self) -> &BTreeMap<String, String> {
        &self.default_headers
    }

    /// Default query parameters.
    #[must_use]
    pub const fn default_query(&self) -> &BTreeMap<String, String> {
        &self.default_query
    }

    /// Instance proxy.
    #[must_use]
    pub const fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Instance credentials.
    #[must_use]
    pub const fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    /// Instance default timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    default_headers: BTreeMap<String, String>,
    default_query: BTreeMap<String, String>,
    proxy: Option<Proxy>,
    auth: Option<Auth>,
    timeout: Option<Result<Duration, ConfigError>>,
}

impl ClientConfigBuilder {
    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a default header. Names are case-insensitive.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Add several default headers.
    #[must_use]
    pub fn default_headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.default_header(name, value))
    }

    /// Add a default query parameter.
    #[must_use]
    pub fn default_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_query.insert(name.into(), value.into());
        self
    }

    /// Add several default query parameters.
    #[must_use]
    pub fn default_query_params<K, V>(self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |builder, (name, value)| builder.default_query(name, value))
    }

    /// Set the instance proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set the instance credentials.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the instance default timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Ok(timeout));
        self
    }

    /// Set the instance default timeout in seconds.
    ///
    /// A value that is not a valid duration fails [`build`](Self::build).
    #[must_use]
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout = Some(timeout_from_secs(seconds));
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .as_deref()
            .map(parse_base_url)
            .transpose()?;
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        let timeout = self.timeout.transpose()?;
        Ok(ClientConfig {
            base_url,
            default_headers: self.default_headers,
            default_query: self.default_query,
            proxy: self.proxy,
            auth: self.auth,
            timeout,
        })
    }
}

/// Convert a timeout given in seconds.
///
/// Negative, non-finite and overflowing values are rejected.
pub fn timeout_from_secs(seconds: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|err| ConfigError::InvalidTimeout(format!("{seconds} seconds: {err}")))
}

// ============================================================================
// Resolution
// ============================================================================

/// Configuration of one call after merging all layers.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    base_url: Url,
    headers: BTreeMap<String, String>,
    query: BTreeMap<String, Vec<String>>,
    proxy: Option<Proxy>,
    timeout: Option<Duration>,
    auth: Option<Auth>,
}

impl EffectiveConfig {
    /// Base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Merged headers, names lower-cased.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Merged query parameters.
    #[must_use]
    pub const fn query(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    /// Proxy, in the representation it was declared with.
    #[must_use]
    pub const fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Timeout, if any layer sets one.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Instance credentials.
    #[must_use]
    pub const fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }
}

/// Merge client, route and call configuration.
///
/// Deterministic: the same inputs always give the same output.
pub fn resolve(
    client: Option<&ClientConfig>,
    route: &RouteDescriptor,
    ctx: &CallContext,
) -> Result<EffectiveConfig> {
    let options = route.options();

    let base_url = options
        .base_url()
        .or_else(|| client.and_then(ClientConfig::base_url))
        .cloned()
        .ok_or_else(|| Error::Config(ConfigError::MissingBaseUrl(route.name().to_string())))?;

    let mut headers = client
        .map(|c| c.default_headers.clone())
        .unwrap_or_default();
    headers.extend(ctx.headers().iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut query: BTreeMap<String, Vec<String>> = client
        .map(|c| {
            c.default_query
                .iter()
                .map(|(k, v)| (k.clone(), vec![v.clone()]))
                .collect()
        })
        .unwrap_or_default();
    query.extend(ctx.query().iter().map(|(k, v)| (k.clone(), v.clone())));

    let proxy = options
        .proxy()
        .or_else(|| client.and_then(ClientConfig::proxy))
        .cloned();

    let timeout = ctx
        .timeout()
        .or(options.timeout())
        .or_else(|| client.and_then(ClientConfig::timeout));

    Ok(EffectiveConfig {
        base_url,
        headers,
        query,
        proxy,
        timeout,
        auth: client.and_then(|c| c.auth.clone()),
    })
}
