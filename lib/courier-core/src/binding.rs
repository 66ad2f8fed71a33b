//! Parameter classification and per-call value resolution.
//!
//! A route declares its parameters once as [`Param`]s. [`BindingPlan::classify`]
//! turns them into role-tagged [`ParamBinding`]s against the route's path
//! template; this happens exactly once per route. Each call then hands the
//! plan its [`Args`], and [`BindingPlan::resolve`] produces the ephemeral
//! [`CallContext`] the resolver and request builder read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::body::{kind_of, to_value};
use crate::{BindingFault, ConfigError, Error, Part, PathTemplate, Result, Stage};

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Marker {
    Path(Option<String>),
    Query(Option<String>),
    Header(Option<String>),
    Body,
    Field(Option<String>),
    Files,
    Timeout,
    Unmarked,
}

/// A declared call parameter, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    marker: Marker,
    default: Option<ArgValue>,
}

impl Param {
    fn new(name: impl Into<String>, marker: Marker) -> Self {
        Self {
            name: name.into(),
            marker,
            default: None,
        }
    }

    /// Path parameter bound to the placeholder of the same name.
    #[must_use]
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Path(None))
    }

    /// Path parameter bound to an explicit placeholder.
    #[must_use]
    pub fn path_as(name: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::new(name, Marker::Path(Some(placeholder.into())))
    }

    /// Query parameter sent under its own name.
    #[must_use]
    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Query(None))
    }

    /// Query parameter sent under `key`.
    #[must_use]
    pub fn query_as(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(name, Marker::Query(Some(key.into())))
    }

    /// Header parameter. The header name defaults to the parameter name with
    /// `_` replaced by `-`.
    #[must_use]
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Header(None))
    }

    /// Header parameter sent as `header`.
    #[must_use]
    pub fn header_as(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::new(name, Marker::Header(Some(header.into())))
    }

    /// The whole JSON body.
    #[must_use]
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Body)
    }

    /// One field of a JSON body object.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Field(None))
    }

    /// One field of a JSON body object, stored under `key`.
    #[must_use]
    pub fn field_as(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(name, Marker::Field(Some(key.into())))
    }

    /// A map of field name to file content, sent as multipart.
    #[must_use]
    pub fn files(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Files)
    }

    /// Per-call timeout override.
    #[must_use]
    pub fn timeout(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Timeout)
    }

    /// A parameter with no marker.
    ///
    /// It binds as a path parameter when a placeholder has its name, and as a
    /// dependency value otherwise.
    #[must_use]
    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, Marker::Unmarked)
    }

    /// Value used when the call omits the argument.
    #[must_use]
    pub fn default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Classified bindings
// ============================================================================

/// The role a parameter plays in building the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Substituted into the named placeholder.
    PathParam(String),
    /// Appended to the query string under this key.
    QueryParam(String),
    /// The whole JSON body.
    JsonBody,
    /// One field of the JSON body object.
    JsonField(String),
    /// Sent as the named header.
    Header(String),
    /// Map of field name to binary content.
    FileUpload(String),
    /// Per-call timeout.
    TimeoutOverride,
    /// Anything else; sent as a query parameter named after the parameter.
    DependencyValue,
}

/// A classified parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBinding {
    name: String,
    role: ParamRole,
    default: Option<ArgValue>,
}

impl ParamBinding {
    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigned role.
    #[must_use]
    pub const fn role(&self) -> &ParamRole {
        &self.role
    }

    /// Declared default.
    #[must_use]
    pub const fn default_value(&self) -> Option<&ArgValue> {
        self.default.as_ref()
    }
}

/// The ordered, frozen bindings of one route.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingPlan {
    bindings: Vec<ParamBinding>,
}

impl BindingPlan {
    /// Classify `params` against `template`.
    ///
    /// Fails when a placeholder stays unbound, a path parameter targets a
    /// missing placeholder, names repeat, or body roles conflict.
    pub fn classify(template: &PathTemplate, params: Vec<Param>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut bindings = Vec::with_capacity(params.len());

        for param in params {
            if !seen.insert(param.name.clone()) {
                return Err(ConfigError::DuplicateParam(param.name));
            }
            let role = match param.marker {
                Marker::Path(alias) => {
                    let placeholder = alias.unwrap_or_else(|| param.name.clone());
                    if !template.has_placeholder(&placeholder) {
                        return Err(ConfigError::UnknownPlaceholder {
                            template: template.to_string(),
                            param: param.name,
                            placeholder,
                        });
                    }
                    ParamRole::PathParam(placeholder)
                }
                Marker::Query(key) => ParamRole::QueryParam(key.unwrap_or_else(|| param.name.clone())),
                Marker::Header(header) => ParamRole::Header(
                    header.unwrap_or_else(|| param.name.replace('_', "-")),
                ),
                Marker::Body => ParamRole::JsonBody,
                Marker::Field(key) => ParamRole::JsonField(key.unwrap_or_else(|| param.name.clone())),
                Marker::Files => ParamRole::FileUpload(param.name.clone()),
                Marker::Timeout => ParamRole::TimeoutOverride,
                Marker::Unmarked if template.has_placeholder(&param.name) => {
                    ParamRole::PathParam(param.name.clone())
                }
                Marker::Unmarked => ParamRole::DependencyValue,
            };
            bindings.push(ParamBinding {
                name: param.name,
                role,
                default: param.default,
            });
        }

        let plan = Self { bindings };
        plan.check(template)?;
        Ok(plan)
    }

    fn check(&self, template: &PathTemplate) -> Result<(), ConfigError> {
        let count = |pred: fn(&ParamRole) -> bool| self.bindings.iter().filter(|b| pred(&b.role)).count();

        let bodies = count(|r| matches!(r, ParamRole::JsonBody));
        let fields = count(|r| matches!(r, ParamRole::JsonField(_)));
        let files = count(|r| matches!(r, ParamRole::FileUpload(_)));
        if bodies > 1 {
            return Err(ConfigError::ConflictingBody(
                "more than one whole-body parameter".to_string(),
            ));
        }
        if bodies > 0 && fields > 0 {
            return Err(ConfigError::ConflictingBody(
                "whole-body and body-field parameters on one route".to_string(),
            ));
        }
        if files > 0 && bodies + fields > 0 {
            return Err(ConfigError::ConflictingBody(
                "JSON body and file upload on one route".to_string(),
            ));
        }
        if count(|r| matches!(r, ParamRole::TimeoutOverride)) > 1 {
            return Err(ConfigError::DuplicateTimeout);
        }

        // Keys that land in one map must be distinct, or a value would be lost.
        let mut field_keys = HashSet::new();
        let mut query_keys = HashSet::new();
        let mut header_names = HashSet::new();
        for binding in &self.bindings {
            let (keys, key) = match &binding.role {
                ParamRole::JsonField(key) => (&mut field_keys, key.clone()),
                ParamRole::QueryParam(key) => (&mut query_keys, key.clone()),
                ParamRole::DependencyValue => (&mut query_keys, binding.name.clone()),
                ParamRole::Header(name) => (&mut header_names, name.to_ascii_lowercase()),
                _ => continue,
            };
            if !keys.insert(key.clone()) {
                return Err(ConfigError::DuplicateParam(key));
            }
        }

        for placeholder in template.placeholders() {
            let bound = self
                .bindings
                .iter()
                .any(|b| matches!(&b.role, ParamRole::PathParam(p) if p == placeholder));
            if !bound {
                return Err(ConfigError::UnboundPlaceholder {
                    template: template.to_string(),
                    placeholder: placeholder.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bindings in declaration order.
    #[must_use]
    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    /// Returns `true` if a binding has `role`.
    #[must_use]
    pub fn has_role(&self, role: &ParamRole) -> bool {
        self.bindings.iter().any(|b| &b.role == role)
    }

    /// Resolve the call's arguments into a [`CallContext`].
    ///
    /// Omitted arguments fall back to their default. A path parameter with
    /// neither is a validation error; other roles are simply left out.
    pub fn resolve(&self, mut args: Args) -> Result<CallContext> {
        let mut ctx = CallContext::default();

        for binding in &self.bindings {
            let value = match args.values.remove(&binding.name) {
                Some(ArgValue::Null) | None => binding.default.clone(),
                Some(value) => Some(value),
            };
            let Some(value) = value.filter(|v| !matches!(v, ArgValue::Null)) else {
                if matches!(binding.role, ParamRole::PathParam(_)) {
                    return Err(binding_error(BindingFault::Missing(binding.name.clone())));
                }
                continue;
            };
            ctx.bind(binding, value)?;
        }

        if let Some(name) = args.values.into_keys().min() {
            return Err(binding_error(BindingFault::Unexpected(name)));
        }
        Ok(ctx)
    }
}

fn binding_error(fault: BindingFault) -> Error {
    Error::validation(Stage::Binding, fault)
}

fn mismatch(binding: &ParamBinding, expected: &'static str, value: &ArgValue) -> Error {
    binding_error(BindingFault::Mismatch {
        param: binding.name.clone(),
        expected,
        found: value.kind(),
    })
}

// ============================================================================
// Argument values
// ============================================================================

/// A runtime argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Absent; the default applies.
    Null,
    /// Structured data, including serialized models.
    Json(Value),
    /// Raw text. As a whole body it is parsed as JSON.
    Text(String),
    /// Files for a multipart upload.
    Files(Vec<Part>),
    /// A duration, for timeout overrides.
    Duration(Duration),
}

impl ArgValue {
    /// Serialize any model into a JSON value.
    ///
    /// `None` and unit serialize to [`ArgValue::Null`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(match to_value(value)? {
            Value::Null => Self::Null,
            other => Self::Json(other),
        })
    }

    /// Build a file map from `(field name, content)` pairs.
    pub fn files<K, V>(files: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Bytes>,
    {
        Self::Files(
            files
                .into_iter()
                .map(|(name, data)| Part::upload(name, data))
                .collect(),
        )
    }

    /// A timeout given in seconds.
    ///
    /// Negative, non-finite and overflowing values are binding errors.
    pub fn seconds(seconds: f64) -> Result<Self> {
        Duration::try_from_secs_f64(seconds)
            .map(Self::Duration)
            .map_err(|err| Error::validation(Stage::Binding, err))
    }

    /// Kind name, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Json(value) => kind_of(value),
            Self::Text(_) => "text",
            Self::Files(_) => "a file map",
            Self::Duration(_) => "a duration",
        }
    }

    /// Text form for a path segment, query value or header.
    ///
    /// Strings render as is, numbers and booleans with their JSON spelling,
    /// and nested structures as compact JSON.
    fn render(&self) -> Option<String> {
        match self {
            Self::Text(text) | Self::Json(Value::String(text)) => Some(text.clone()),
            Self::Json(Value::Null) | Self::Null | Self::Files(_) => None,
            Self::Json(value) => Some(value.to_string()),
            Self::Duration(duration) => Some(duration.as_secs_f64().to_string()),
        }
    }

    /// Query values; arrays expand into repeated keys.
    fn render_all(&self) -> Option<Vec<String>> {
        match self {
            Self::Json(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|item| Self::Json(item.clone()).render())
                    .collect(),
            ),
            other => other.render().map(|v| vec![v]),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}

impl From<Map<String, Value>> for ArgValue {
    fn from(value: Map<String, Value>) -> Self {
        Self::Json(Value::Object(value))
    }
}

impl From<Duration> for ArgValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<Vec<Part>> for ArgValue {
    fn from(value: Vec<Part>) -> Self {
        Self::Files(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! arg_value_from_json {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    Self::Json(Value::from(value))
                }
            }
        )*
    };
}

arg_value_from_json!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, |n| Self::Json(Value::Number(n)))
    }
}

/// Named argument values of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: HashMap<String, ArgValue>,
}

impl Args {
    /// No arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add an argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Call context
// ============================================================================

/// Body-bearing values of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundBody {
    /// The whole body, still uninterpreted.
    Whole(ArgValue),
    /// Body fields merged into one object.
    Fields(Map<String, Value>),
    /// Files for a multipart body.
    Files(Vec<Part>),
}

/// Resolved argument values of one call, keyed by role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    path: HashMap<String, String>,
    query: BTreeMap<String, Vec<String>>,
    headers: BTreeMap<String, String>,
    body: Option<BoundBody>,
    timeout: Option<Duration>,
}

impl CallContext {
    fn bind(&mut self, binding: &ParamBinding, value: ArgValue) -> Result<()> {
        match &binding.role {
            ParamRole::PathParam(placeholder) => {
                let text = value
                    .render()
                    .ok_or_else(|| mismatch(binding, "a scalar", &value))?;
                self.path.insert(placeholder.clone(), text);
            }
            ParamRole::QueryParam(key) => {
                let values = value
                    .render_all()
                    .ok_or_else(|| mismatch(binding, "a scalar or list", &value))?;
                self.query.insert(key.clone(), values);
            }
            ParamRole::Header(name) => {
                let text = value
                    .render()
                    .ok_or_else(|| mismatch(binding, "a scalar", &value))?;
                self.headers.insert(name.to_ascii_lowercase(), text);
            }
            ParamRole::JsonBody => {
                if matches!(value, ArgValue::Files(_) | ArgValue::Duration(_)) {
                    return Err(mismatch(binding, "a JSON value or text", &value));
                }
                self.body = Some(BoundBody::Whole(value));
            }
            ParamRole::JsonField(key) => {
                let field = match value {
                    ArgValue::Json(json) => json,
                    ArgValue::Text(text) => Value::String(text),
                    other => return Err(mismatch(binding, "a JSON value or text", &other)),
                };
                match &mut self.body {
                    Some(BoundBody::Fields(fields)) => {
                        fields.insert(key.clone(), field);
                    }
                    _ => {
                        let mut fields = Map::new();
                        fields.insert(key.clone(), field);
                        self.body = Some(BoundBody::Fields(fields));
                    }
                }
            }
            ParamRole::FileUpload(_) => {
                let ArgValue::Files(parts) = value else {
                    return Err(mismatch(binding, "a file map", &value));
                };
                match &mut self.body {
                    Some(BoundBody::Files(existing)) => existing.extend(parts),
                    _ => self.body = Some(BoundBody::Files(parts)),
                }
            }
            ParamRole::TimeoutOverride => {
                let timeout = match &value {
                    ArgValue::Duration(duration) => *duration,
                    ArgValue::Json(Value::Number(n)) => n
                        .as_f64()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                        .ok_or_else(|| mismatch(binding, "a duration", &value))?,
                    _ => return Err(mismatch(binding, "a duration", &value)),
                };
                self.timeout = Some(timeout);
            }
            ParamRole::DependencyValue => {
                let interpreted = match value {
                    ArgValue::Text(text) => {
                        ArgValue::Json(serde_json::from_str(&text).unwrap_or(Value::String(text)))
                    }
                    other => other,
                };
                let values = interpreted
                    .render_all()
                    .ok_or_else(|| mismatch(binding, "a scalar or list", &interpreted))?;
                self.query.insert(binding.name.clone(), values);
            }
        }
        Ok(())
    }

    /// Placeholder values, not yet encoded.
    #[must_use]
    pub const fn path(&self) -> &HashMap<String, String> {
        &self.path
    }

    /// Per-call query parameters.
    #[must_use]
    pub const fn query(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    /// Per-call headers, names lower-cased.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Bound body values.
    #[must_use]
    pub const fn body(&self) -> Option<&BoundBody> {
        self.body.as_ref()
    }

    /// Per-call timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
