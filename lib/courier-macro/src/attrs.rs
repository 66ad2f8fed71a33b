//! Attribute parsing for courier proc-macros.

use syn::parse::{Parse, ParseStream};
use syn::{Expr, Ident, LitStr, Token, Type};

/// HTTP method for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Variant name of `courier::Method`, for code generation.
    #[must_use]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::Post => "Post",
            Self::Put => "Put",
            Self::Delete => "Delete",
            Self::Patch => "Patch",
            Self::Head => "Head",
            Self::Options => "Options",
        }
    }

    /// Parse an HTTP verb (case-insensitive).
    #[must_use]
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Method attribute named after this verb (`get`, `post`, ...).
    pub(crate) fn from_attr(attr: &syn::Attribute) -> Option<Self> {
        let ident = attr.path().get_ident()?.to_string();
        match ident.as_str() {
            "get" | "post" | "put" | "delete" | "patch" | "head" | "options" => Self::parse(&ident),
            _ => None,
        }
    }
}

/// Route-level options shared by the verb attributes.
///
/// `timeout = 2.5`, `base_url = "https://..."`, `proxies = "http://..."`.
#[derive(Debug, Default)]
pub(crate) struct RouteOptions {
    pub(crate) timeout: Option<Expr>,
    pub(crate) base_url: Option<LitStr>,
    pub(crate) proxy: Option<LitStr>,
}

impl RouteOptions {
    fn parse_entry(&mut self, input: ParseStream<'_>) -> syn::Result<()> {
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        match key.to_string().as_str() {
            "timeout" => set_once(&mut self.timeout, &key, input.parse()?),
            "base_url" => set_once(&mut self.base_url, &key, input.parse()?),
            "proxies" | "proxy" => set_once(&mut self.proxy, &key, input.parse()?),
            other => Err(syn::Error::new(
                key.span(),
                format!("unknown route option `{other}` (expected timeout, base_url or proxies)"),
            )),
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &Ident, value: T) -> syn::Result<()> {
    if slot.is_some() {
        return Err(syn::Error::new(key.span(), format!("duplicate option `{key}`")));
    }
    *slot = Some(value);
    Ok(())
}

/// Arguments of a verb attribute: `"path", option = value, ...`.
#[derive(Debug)]
pub(crate) struct RouteArgs {
    pub(crate) path: LitStr,
    pub(crate) options: RouteOptions,
}

impl Parse for RouteArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let path: LitStr = input.parse()?;
        let mut options = RouteOptions::default();
        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            options.parse_entry(input)?;
        }
        Ok(Self { path, options })
    }
}

/// A fully parsed route attribute.
#[derive(Debug)]
pub(crate) struct RouteAttr {
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) options: RouteOptions,
}

impl RouteAttr {
    /// Parse `#[http("VERB path", ...)]` arguments.
    pub(crate) fn from_http_args(args: RouteArgs) -> syn::Result<Self> {
        let spec = args.path.value();
        let (verb, path) = spec.trim().split_once(' ').ok_or_else(|| {
            syn::Error::new_spanned(
                &args.path,
                "expected format: \"VERB path\" (e.g., \"GET users/{id}\")",
            )
        })?;
        let method = HttpMethod::parse(verb).ok_or_else(|| {
            syn::Error::new_spanned(
                &args.path,
                format!(
                    "unsupported HTTP method: {verb}. Supported: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS"
                ),
            )
        })?;
        Ok(Self {
            method,
            path: path.trim().to_string(),
            options: args.options,
        })
    }

    /// Parse arguments of a verb-named attribute.
    pub(crate) fn from_verb_args(method: HttpMethod, args: RouteArgs) -> Self {
        Self {
            method,
            path: args.path.value(),
            options: args.options,
        }
    }
}

/// Find the route attribute among a method's attributes.
pub(crate) fn find_route_attr(attrs: &[syn::Attribute]) -> syn::Result<Option<RouteAttr>> {
    let mut found = None;
    for attr in attrs {
        let route = if let Some(method) = HttpMethod::from_attr(attr) {
            RouteAttr::from_verb_args(method, attr.parse_args()?)
        } else if attr.path().is_ident("http") {
            RouteAttr::from_http_args(attr.parse_args()?)?
        } else {
            continue;
        };
        if found.is_some() {
            return Err(syn::Error::new_spanned(attr, "a method declares one route only"));
        }
        found = Some(route);
    }
    Ok(found)
}

/// `#[rate_limit(max_calls = 1, interval = 1)]`, interval in seconds.
#[derive(Debug)]
pub(crate) struct RateLimitAttr {
    pub(crate) max_calls: Expr,
    pub(crate) interval: Expr,
}

pub(crate) fn find_rate_limit(attrs: &[syn::Attribute]) -> syn::Result<Option<RateLimitAttr>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("rate_limit")) else {
        return Ok(None);
    };
    let mut max_calls = None;
    let mut interval = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("max_calls") {
            max_calls = Some(meta.value()?.parse::<Expr>()?);
        } else if meta.path.is_ident("interval") {
            interval = Some(meta.value()?.parse::<Expr>()?);
        } else {
            return Err(meta.error("expected `max_calls` or `interval`"));
        }
        Ok(())
    })?;
    match (max_calls, interval) {
        (Some(max_calls), Some(interval)) => Ok(Some(RateLimitAttr {
            max_calls,
            interval,
        })),
        _ => Err(syn::Error::new_spanned(
            attr,
            "rate_limit requires both `max_calls` and `interval`",
        )),
    }
}

/// Client-level defaults from `#[courier(...)]`.
#[derive(Debug, Default)]
pub(crate) struct ClientArgs {
    pub(crate) base_url: Option<LitStr>,
    pub(crate) proxy: Option<LitStr>,
    pub(crate) timeout: Option<Expr>,
}

impl Parse for ClientArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let mut options = RouteOptions::default();
        while !input.is_empty() {
            options.parse_entry(input)?;
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(Self {
            base_url: options.base_url,
            proxy: options.proxy,
            timeout: options.timeout,
        })
    }
}

/// Binding role marker of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParamKind {
    /// No marker: a path parameter when the name matches a placeholder.
    Unmarked,
    Path(Option<String>),
    Query(Option<String>),
    Header(Option<String>),
    Body,
    Field(Option<String>),
    Files,
    Timeout,
}

/// A parsed method parameter.
#[derive(Debug)]
pub(crate) struct MethodParam {
    pub(crate) name: Ident,
    pub(crate) ty: Type,
    pub(crate) kind: ParamKind,
    pub(crate) default: Option<Expr>,
}

/// Parameter attribute names stripped from the emitted code.
pub(crate) const PARAM_ATTRS: &[&str] = &[
    "path", "query", "header", "body", "field", "files", "timeout", "default",
];

pub(crate) fn is_param_attr(attr: &syn::Attribute) -> bool {
    PARAM_ATTRS.iter().any(|name| attr.path().is_ident(name))
}

/// Parse the marker and default of one parameter.
pub(crate) fn parse_param(name: Ident, ty: Type, attrs: &[syn::Attribute]) -> syn::Result<MethodParam> {
    let mut kind = None;
    let mut default = None;

    for attr in attrs {
        let path = attr.path();
        let parsed = if path.is_ident("path") {
            ParamKind::Path(optional_string_arg(attr)?)
        } else if path.is_ident("query") {
            ParamKind::Query(optional_string_arg(attr)?)
        } else if path.is_ident("header") {
            ParamKind::Header(optional_string_arg(attr)?)
        } else if path.is_ident("body") {
            ParamKind::Body
        } else if path.is_ident("field") {
            ParamKind::Field(optional_string_arg(attr)?)
        } else if path.is_ident("files") {
            ParamKind::Files
        } else if path.is_ident("timeout") {
            ParamKind::Timeout
        } else if path.is_ident("default") {
            if default.is_some() {
                return Err(syn::Error::new_spanned(attr, "duplicate #[default]"));
            }
            default = Some(attr.parse_args::<Expr>()?);
            continue;
        } else {
            continue;
        };
        if kind.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                format!("parameter `{name}` has more than one role marker"),
            ));
        }
        kind = Some(parsed);
    }

    Ok(MethodParam {
        name,
        ty,
        kind: kind.unwrap_or(ParamKind::Unmarked),
        default,
    })
}

/// `#[marker]` gives `None`, `#[marker("name")]` gives the name.
fn optional_string_arg(attr: &syn::Attribute) -> syn::Result<Option<String>> {
    match &attr.meta {
        syn::Meta::Path(_) => Ok(None),
        syn::Meta::List(list) => {
            let lit: LitStr = syn::parse2(list.tokens.clone())?;
            Ok(Some(lit.value()))
        }
        syn::Meta::NameValue(nv) => Err(syn::Error::new_spanned(
            nv,
            "expected `#[marker]` or `#[marker(\"name\")]`",
        )),
    }
}

/// Extract placeholder names from a path template.
///
/// E.g., `users/{id}/posts/{post_id}` returns `["id", "post_id"]`
#[must_use]
pub(crate) fn extract_path_placeholders(path: &str) -> Vec<String> {
    let mut placeholders = Vec::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for next in chars.by_ref() {
                if next == '}' {
                    break;
                }
                name.push(next);
            }
            if !name.is_empty() {
                placeholders.push(name);
            }
        }
    }
    placeholders
}
