//! Route descriptors and their registry.
//!
//! A [`RouteDescriptor`] is built once per declared endpoint by a
//! [`RouteBuilder`] and stays frozen for the life of the process. Building
//! validates everything that can be checked without a call: template syntax,
//! placeholder coverage, body-role conflicts, base URL and proxy syntax.
//!
//! ```
//! use courier_core::{Method, Param, ResponseShape, RouteBuilder};
//!
//! let route = RouteBuilder::new("docs", "get_user", Method::Get, "users/{user_id}")
//!     .param(Param::path("user_id"))
//!     .returns(ResponseShape::Model)
//!     .build()
//!     .expect("valid route");
//! assert_eq!(route.template().as_str(), "users/{user_id}");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use url::Url;

use crate::rate_limit::{TokenBucket, bucket_for};
use crate::{
    Args, BindingPlan, CallContext, ClientConfig, ConfigError, EffectiveConfig, Error, Method,
    Param, PathTemplate, Proxy, RateLimit, Request, ResponseShape, Result, timeout_from_secs,
};

/// Stable identity of a route: owning declaration, verb and path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    owner: String,
    method: Method,
    template: String,
}

impl RouteKey {
    /// Create a route key.
    #[must_use]
    pub fn new(owner: impl Into<String>, method: Method, template: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method,
            template: template.into(),
        }
    }

    /// Owning declaration, usually a module path plus a trait name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// HTTP verb.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Path template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.owner, self.method, self.template)
    }
}

/// Per-route overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOptions {
    timeout: Option<Duration>,
    base_url: Option<Url>,
    proxy: Option<Proxy>,
    rate_limit: Option<RateLimit>,
}

impl RouteOptions {
    /// Route timeout default.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Route base URL override.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Route proxy override.
    #[must_use]
    pub const fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Route rate limit.
    #[must_use]
    pub const fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }
}

/// Builder for [`RouteDescriptor`].
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    owner: String,
    name: String,
    method: Method,
    template: String,
    timeout: Option<Result<Duration, ConfigError>>,
    base_url: Option<String>,
    proxy: Option<Proxy>,
    rate_limit: Option<Result<RateLimit, ConfigError>>,
    params: Vec<Param>,
    shape: ResponseShape,
    standalone: bool,
}

impl RouteBuilder {
    /// Start a route named `name`, owned by `owner`.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        method: Method,
        template: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            method,
            template: template.into(),
            timeout: None,
            base_url: None,
            proxy: None,
            rate_limit: None,
            params: Vec::new(),
            shape: ResponseShape::Raw,
            standalone: false,
        }
    }

    /// Route timeout default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(Ok(timeout));
        self
    }

    /// Route timeout default, in seconds.
    ///
    /// A value that is not a valid duration fails [`build`](Self::build).
    #[must_use]
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout = Some(timeout_from_secs(seconds));
        self
    }

    /// Base URL override.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Proxy override, used verbatim.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Rate limit shared by every client of this route.
    #[must_use]
    pub fn rate_limit(mut self, max_calls: u32, interval: Duration) -> Self {
        self.rate_limit = Some(RateLimit::new(max_calls, interval));
        self
    }

    /// Rate limit with the interval given in seconds.
    #[must_use]
    pub fn rate_limit_secs(mut self, max_calls: u32, interval: f64) -> Self {
        self.rate_limit = Some(RateLimit::from_secs(max_calls, interval));
        self
    }

    /// Declare the next parameter.
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Declared return shape.
    #[must_use]
    pub const fn returns(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// Mark the route as usable without a client instance.
    ///
    /// Standalone routes must declare their own base URL.
    #[must_use]
    pub const fn standalone(mut self) -> Self {
        self.standalone = true;
        self
    }

    /// Validate and freeze the route.
    pub fn build(self) -> Result<RouteDescriptor, ConfigError> {
        let template = PathTemplate::parse(self.template)?;
        let plan = BindingPlan::classify(&template, self.params)?;

        let base_url = self.base_url.map(|url| parse_base_url(&url)).transpose()?;
        if self.standalone && base_url.is_none() {
            return Err(ConfigError::MissingBaseUrl(self.name));
        }
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        let timeout = self.timeout.transpose()?;
        let rate_limit = self.rate_limit.transpose()?;

        Ok(RouteDescriptor {
            name: self.name,
            key: RouteKey::new(self.owner, self.method, template.as_str()),
            template,
            options: RouteOptions {
                timeout,
                base_url,
                proxy: self.proxy,
                rate_limit,
            },
            plan,
            shape: self.shape,
            standalone: self.standalone,
            bucket: OnceLock::new(),
        })
    }
}

/// Parse a base URL so that relative paths join under it.
///
/// A trailing `/` is added when missing, so `https://host/api` joined with
/// `users` gives `https://host/api/users`.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let mut url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// A frozen route.
#[derive(Debug)]
pub struct RouteDescriptor {
    name: String,
    key: RouteKey,
    template: PathTemplate,
    options: RouteOptions,
    plan: BindingPlan,
    shape: ResponseShape,
    standalone: bool,
    bucket: OnceLock<Arc<TokenBucket>>,
}

impl RouteDescriptor {
    /// Method name the route was declared under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route identity.
    #[must_use]
    pub const fn key(&self) -> &RouteKey {
        &self.key
    }

    /// HTTP verb.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.key.method
    }

    /// Path template.
    #[must_use]
    pub const fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Per-route overrides.
    #[must_use]
    pub const fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Binding plan.
    #[must_use]
    pub const fn plan(&self) -> &BindingPlan {
        &self.plan
    }

    /// Declared return shape.
    #[must_use]
    pub const fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Returns `true` for routes usable without a client instance.
    #[must_use]
    pub const fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// The shared bucket of a rate-limited route.
    #[must_use]
    pub fn limiter(&self) -> Option<&TokenBucket> {
        let limit = self.options.rate_limit?;
        Some(
            self.bucket
                .get_or_init(|| bucket_for(&self.key, limit))
                .as_ref(),
        )
    }

    /// Bind `args` and resolve the effective configuration of one call.
    ///
    /// Pure: performs no I/O and takes no rate-limit token.
    pub fn prepare(&self, client: Option<&ClientConfig>, args: Args) -> Result<Prepared<'_>> {
        let ctx = self.plan.resolve(args)?;
        let effective = crate::config::resolve(client, self, &ctx)?;
        Ok(Prepared {
            route: self,
            ctx,
            effective,
        })
    }
}

/// A call with bound arguments and resolved configuration.
#[derive(Debug)]
pub struct Prepared<'a> {
    route: &'a RouteDescriptor,
    ctx: CallContext,
    effective: EffectiveConfig,
}

impl Prepared<'_> {
    /// Bound argument values.
    #[must_use]
    pub const fn context(&self) -> &CallContext {
        &self.ctx
    }

    /// Effective configuration.
    #[must_use]
    pub const fn effective(&self) -> &EffectiveConfig {
        &self.effective
    }

    /// Build the request descriptor.
    pub fn assemble(&self) -> Result<Request> {
        crate::assemble::assemble(self.route, &self.ctx, &self.effective)
    }
}

/// The routes of one owning declaration, by method name.
///
/// A route that failed to build is kept as its error and returned on every
/// lookup.
#[derive(Debug)]
pub struct RouteRegistry {
    owner: String,
    routes: HashMap<String, Result<RouteDescriptor, ConfigError>>,
}

impl RouteRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            routes: HashMap::new(),
        }
    }

    /// Owning declaration.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Build and store a route under its name.
    pub fn register(&mut self, builder: RouteBuilder) -> &mut Self {
        let name = builder.name.clone();
        let route = builder.build();
        if let Err(err) = &route {
            tracing::warn!(owner = %self.owner, route = %name, error = %err, "route registration failed");
        }
        self.routes.insert(name, route);
        self
    }

    /// Route by method name.
    pub fn get(&self, name: &str) -> Result<&RouteDescriptor> {
        match self.routes.get(name) {
            Some(Ok(route)) => Ok(route),
            Some(Err(err)) => Err(Error::Config(err.clone())),
            None => Err(Error::Config(ConfigError::UnknownRoute(name.to_string()))),
        }
    }

    /// Registered route names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;
    use crate::ParamRole;

    #[test]
    fn build_freezes_route() {
        let route = RouteBuilder::new("tests", "get_user", Method::Get, "users/{user_id}")
            .param(Param::value("user_id"))
            .timeout_secs(2.0)
            .returns(ResponseShape::Model)
            .build()
            .expect("route");

        check!(route.name() == "get_user");
        check!(route.method() == Method::Get);
        check!(route.shape() == ResponseShape::Model);
        check!(route.options().timeout() == Some(Duration::from_secs(2)));
        check!(route.key() == &RouteKey::new("tests", Method::Get, "users/{user_id}"));
        check!(
            route.plan().bindings().first().map(|b| b.role().clone())
                == Some(ParamRole::PathParam("user_id".to_string()))
        );
        check!(route.limiter().is_none());
    }

    #[test]
    fn build_rejects_unbound_placeholder() {
        let result = RouteBuilder::new("tests", "get_user", Method::Get, "users/{user_id}").build();
        check!(let Err(ConfigError::UnboundPlaceholder { .. }) = result);
    }

    #[test]
    fn standalone_requires_base_url() {
        let result = RouteBuilder::new("tests", "upload", Method::Post, "upload")
            .standalone()
            .build();
        check!(let Err(ConfigError::MissingBaseUrl(_)) = result);

        let route = RouteBuilder::new("tests", "upload", Method::Post, "upload")
            .standalone()
            .base_url("https://files.example.com/v1")
            .build()
            .expect("route");
        check!(route.is_standalone());
        check!(
            route.options().base_url().map(Url::as_str) == Some("https://files.example.com/v1/")
        );
    }

    #[test]
    fn build_rejects_bad_options() {
        let result = RouteBuilder::new("tests", "a", Method::Get, "a")
            .base_url("not a url")
            .build();
        check!(let Err(ConfigError::InvalidBaseUrl { .. }) = result);

        let result = RouteBuilder::new("tests", "a", Method::Get, "a")
            .rate_limit(0, Duration::from_secs(1))
            .build();
        check!(let Err(ConfigError::InvalidRateLimit(_)) = result);

        let result = RouteBuilder::new("tests", "a", Method::Get, "a")
            .proxy("::::")
            .build();
        check!(let Err(ConfigError::InvalidProxy { .. }) = result);
    }

    #[test]
    fn build_rejects_unusable_durations() {
        for seconds in [-1.0, 1e30, f64::INFINITY] {
            let result = RouteBuilder::new("tests", "a", Method::Get, "a")
                .timeout_secs(seconds)
                .build();
            check!(let Err(ConfigError::InvalidTimeout(_)) = result);

            let result = RouteBuilder::new("tests", "a", Method::Get, "a")
                .rate_limit_secs(1, seconds)
                .build();
            check!(let Err(ConfigError::InvalidRateLimit(_)) = result);
        }

        let route = RouteBuilder::new("tests", "a", Method::Get, "a")
            .rate_limit_secs(2, 0.5)
            .build()
            .expect("route");
        check!(route.options().rate_limit().map(|l| l.interval()) == Some(Duration::from_millis(500)));
    }

    #[test]
    fn limiter_is_shared_per_key() {
        let build = || {
            RouteBuilder::new("route::tests::limiter", "create", Method::Post, "users")
                .rate_limit(1, Duration::from_secs(1))
                .build()
                .expect("route")
        };
        let first = build();
        let second = build();
        let a = first.limiter().expect("limited");
        let b = second.limiter().expect("limited");
        check!(std::ptr::eq(a, b));
    }

    #[test]
    fn registry_returns_stored_config_error() {
        let mut registry = RouteRegistry::new("tests");
        registry
            .register(RouteBuilder::new("tests", "ok", Method::Get, "ok"))
            .register(RouteBuilder::new("tests", "broken", Method::Get, "users/{id"));

        check!(registry.names() == vec!["broken", "ok"]);
        check!(registry.get("ok").is_ok());
        for _ in 0..2 {
            let_assert!(Err(Error::Config(ConfigError::MalformedTemplate { .. })) = registry.get("broken"));
        }
        let_assert!(Err(Error::Config(ConfigError::UnknownRoute(name))) = registry.get("missing"));
        check!(name == "missing");
    }

    #[test]
    fn parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://jsonplaceholder.typicode.com").expect("url");
        check!(url.as_str() == "https://jsonplaceholder.typicode.com/");
        let url = parse_base_url("https://host/api/").expect("url");
        check!(url.as_str() == "https://host/api/");
        check!(parse_base_url("mailto:someone@example.com").is_err());
    }
}
