//! Code generation for courier proc-macros.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, LitStr, Type, Visibility};

use crate::attrs::{ClientArgs, MethodParam, ParamKind, RateLimitAttr, RouteAttr};

/// How a method's return value is produced from the decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnShape {
    /// `Result<()>`: check for 2xx, drop the body.
    Unit,
    /// `Result<Response>`: the response, any status.
    Raw,
    /// `Result<Map<String, Value>>`.
    Mapping,
    /// `Result<Vec<T>>`.
    Sequence,
    /// `Result<T>`.
    Model,
}

impl ReturnShape {
    fn shape_tokens(self) -> TokenStream {
        match self {
            Self::Unit | Self::Raw => quote! { ::courier::ResponseShape::Raw },
            Self::Mapping => quote! { ::courier::ResponseShape::Mapping },
            Self::Sequence => quote! { ::courier::ResponseShape::Sequence },
            Self::Model => quote! { ::courier::ResponseShape::Model },
        }
    }

    fn finisher(self) -> TokenStream {
        match self {
            Self::Unit => quote! { into_unit() },
            Self::Raw => quote! { into_response() },
            Self::Mapping => quote! { into_mapping() },
            Self::Sequence => quote! { into_sequence() },
            Self::Model => quote! { into_model() },
        }
    }
}

/// Analyze `-> Result<T>` to pick the response shape.
pub(crate) fn analyze_return_type(output: &syn::ReturnType) -> syn::Result<ReturnShape> {
    let syn::ReturnType::Type(_, ty) = output else {
        return Err(syn::Error::new_spanned(
            output,
            "route methods must return `courier::Result<T>`",
        ));
    };
    let inner = unwrap_generic(ty, "Result").ok_or_else(|| {
        syn::Error::new_spanned(ty, "route methods must return `courier::Result<T>`")
    })?;

    Ok(if is_unit_type(inner) {
        ReturnShape::Unit
    } else if last_ident_is(inner, "Response") {
        ReturnShape::Raw
    } else if last_ident_is(inner, "Map") || last_ident_is(inner, "HashMap") {
        ReturnShape::Mapping
    } else if unwrap_generic(inner, "Vec").is_some() {
        ReturnShape::Sequence
    } else {
        ReturnShape::Model
    })
}

fn is_unit_type(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn strip_reference(ty: &Type) -> &Type {
    match ty {
        Type::Reference(reference) => strip_reference(&reference.elem),
        Type::Paren(paren) => strip_reference(&paren.elem),
        other => other,
    }
}

fn last_ident_is(ty: &Type, name: &str) -> bool {
    if let Type::Path(type_path) = strip_reference(ty)
        && let Some(segment) = type_path.path.segments.last()
    {
        return segment.ident == name;
    }
    false
}

/// The first generic argument of `Name<T>`.
fn unwrap_generic<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == name
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner);
    }
    None
}

/// Strings that should travel as raw text (parsed as JSON when used as a body).
fn is_text_type(ty: &Type) -> bool {
    let ty = unwrap_generic(strip_reference(ty), "Option").map_or(ty, strip_reference);
    let ty = strip_reference(ty);
    last_ident_is(ty, "str") || last_ident_is(ty, "String")
}

fn is_duration_type(ty: &Type) -> bool {
    let ty = unwrap_generic(ty, "Option").unwrap_or(ty);
    matches!(ty, Type::Path(_)) && last_ident_is(ty, "Duration")
}

fn is_part_list(ty: &Type) -> bool {
    let ty = unwrap_generic(ty, "Option").unwrap_or(ty);
    unwrap_generic(ty, "Vec").is_some_and(|inner| last_ident_is(inner, "Part"))
}

/// Expression turning the parameter into an `ArgValue`.
pub(crate) fn arg_value_expr(param: &MethodParam) -> TokenStream {
    let name = &param.name;
    match &param.kind {
        ParamKind::Files if is_part_list(&param.ty) => quote! { ::courier::ArgValue::from(#name) },
        ParamKind::Files => quote! { ::courier::ArgValue::files(#name) },
        _ if is_text_type(&param.ty) || is_duration_type(&param.ty) => {
            quote! { ::courier::ArgValue::from(#name) }
        }
        _ => quote! { ::courier::ArgValue::json(&#name)? },
    }
}

/// `courier::Param` declaration of one parameter.
pub(crate) fn param_decl(param: &MethodParam) -> TokenStream {
    let name = param.name.to_string();
    let decl = match &param.kind {
        ParamKind::Unmarked => quote! { ::courier::Param::value(#name) },
        ParamKind::Path(None) => quote! { ::courier::Param::path(#name) },
        ParamKind::Path(Some(alias)) => quote! { ::courier::Param::path_as(#name, #alias) },
        ParamKind::Query(None) => quote! { ::courier::Param::query(#name) },
        ParamKind::Query(Some(key)) => quote! { ::courier::Param::query_as(#name, #key) },
        ParamKind::Header(None) => quote! { ::courier::Param::header(#name) },
        ParamKind::Header(Some(header)) => quote! { ::courier::Param::header_as(#name, #header) },
        ParamKind::Body => quote! { ::courier::Param::body(#name) },
        ParamKind::Field(None) => quote! { ::courier::Param::field(#name) },
        ParamKind::Field(Some(key)) => quote! { ::courier::Param::field_as(#name, #key) },
        ParamKind::Files => quote! { ::courier::Param::files(#name) },
        ParamKind::Timeout => quote! { ::courier::Param::timeout(#name) },
    };
    match &param.default {
        Some(default) => quote! { #decl.default(#default) },
        None => decl,
    }
}

/// `RouteBuilder` expression for one declared route.
pub(crate) fn route_builder(
    owner: &TokenStream,
    fn_name: &Ident,
    route: &RouteAttr,
    rate_limit: Option<&RateLimitAttr>,
    params: &[MethodParam],
    shape: ReturnShape,
) -> TokenStream {
    let name = fn_name.to_string();
    let method = format_ident!("{}", route.method.as_str());
    let template = &route.path;
    let shape = shape.shape_tokens();

    let timeout = route
        .options
        .timeout
        .as_ref()
        .map(|t| quote! { .timeout_secs((#t) as f64) });
    let base_url = route.options.base_url.as_ref().map(|u| quote! { .base_url(#u) });
    let proxy = route.options.proxy.as_ref().map(|p| quote! { .proxy(#p) });
    let rate_limit = rate_limit.map(|RateLimitAttr { max_calls, interval }| {
        quote! {
            .rate_limit_secs((#max_calls) as u32, (#interval) as f64)
        }
    });
    let params = params.iter().map(param_decl);

    quote! {
        ::courier::RouteBuilder::new(#owner, #name, ::courier::Method::#method, #template)
            #timeout
            #base_url
            #proxy
            #rate_limit
            #(.param(#params))*
            .returns(#shape)
    }
}

/// Statements collecting the call's arguments.
pub(crate) fn args_code(params: &[MethodParam]) -> TokenStream {
    let inserts = params.iter().map(|param| {
        let name = param.name.to_string();
        let value = arg_value_expr(param);
        quote! { __courier_args.insert(#name, #value); }
    });
    quote! {
        #[allow(unused_mut)]
        let mut __courier_args = ::courier::Args::new();
        #(#inserts)*
    }
}

/// Dispatch and finishing for a method on a generated client.
pub(crate) fn client_call(is_async: bool, shape: ReturnShape) -> TokenStream {
    let finisher = shape.finisher();
    if is_async {
        quote! { self.inner.call(__courier_route, __courier_args).await?.#finisher }
    } else {
        quote! { self.inner.call_blocking(__courier_route, __courier_args)?.#finisher }
    }
}

/// Dispatch and finishing for a standalone function.
pub(crate) fn standalone_call(is_async: bool, shape: ReturnShape) -> TokenStream {
    let finisher = shape.finisher();
    if is_async {
        quote! {
            ::courier::call(__courier_route, ::courier::default_client(), None, __courier_args).await?.#finisher
        }
    } else {
        quote! {
            ::courier::call_blocking(__courier_route, ::courier::default_blocking_client()?, None, __courier_args)?.#finisher
        }
    }
}

/// The route table type, its client struct and the client builder.
pub(crate) fn generate_client(
    vis: &Visibility,
    trait_name: &Ident,
    is_async: bool,
    defaults: &ClientArgs,
    registrations: &[TokenStream],
) -> TokenStream {
    let routes_name = format_ident!("{}Routes", trait_name);
    let client_name = format_ident!("{}Client", trait_name);
    let builder_name = format_ident!("{}ClientBuilder", trait_name);
    let owner = trait_name.to_string();

    let transport = if is_async {
        quote! { ::courier::HyperClient }
    } else {
        quote! { ::courier::BlockingHyperClient }
    };
    let new_transport = if is_async {
        quote! { ::courier::HyperClient::new() }
    } else {
        quote! { ::courier::BlockingHyperClient::new()? }
    };

    let seed_base_url = defaults.base_url.as_ref().map(|u| quote! { .base_url(#u) });
    let seed_proxy = defaults.proxy.as_ref().map(|p| quote! { .proxy(#p) });
    let seed_timeout = defaults
        .timeout
        .as_ref()
        .map(|t| quote! { .timeout_secs((#t) as f64) });
    let base_url_doc = format!(
        " Set the base URL (default: {}).",
        defaults.base_url.as_ref().map_or_else(|| "none".to_string(), LitStr::value)
    );

    quote! {
        /// Routes declared by the trait, registered once per process.
        #[derive(Debug, Clone, Copy)]
        #vis struct #routes_name;

        impl #routes_name {
            /// The route table.
            #[must_use]
            pub fn registry() -> &'static ::courier::RouteRegistry {
                static REGISTRY: ::std::sync::LazyLock<::courier::RouteRegistry> =
                    ::std::sync::LazyLock::new(|| {
                        let owner = concat!(module_path!(), "::", #owner);
                        let mut registry = ::courier::RouteRegistry::new(owner);
                        #(registry.register(#registrations);)*
                        registry
                    });
                &REGISTRY
            }
        }

        /// Generated client implementing the API trait.
        #[derive(Debug, Clone)]
        #vis struct #client_name<C = #transport> {
            inner: ::courier::ApiClient<C>,
        }

        impl #client_name {
            /// Start configuring a client.
            #[must_use]
            pub fn builder() -> #builder_name {
                #builder_name::default()
            }
        }

        impl<C> #client_name<C> {
            /// The transport and instance configuration.
            #[must_use]
            pub const fn api(&self) -> &::courier::ApiClient<C> {
                &self.inner
            }

            /// The instance configuration.
            #[must_use]
            pub fn config(&self) -> &::courier::ClientConfig {
                self.inner.config()
            }
        }

        /// Builder for the generated client.
        #[derive(Debug, Clone)]
        #vis struct #builder_name {
            config: ::courier::ClientConfigBuilder,
        }

        impl Default for #builder_name {
            fn default() -> Self {
                Self {
                    config: ::courier::ClientConfig::builder()
                        #seed_base_url
                        #seed_proxy
                        #seed_timeout,
                }
            }
        }

        impl #builder_name {
            #[doc = #base_url_doc]
            #[must_use]
            pub fn base_url(mut self, url: impl Into<String>) -> Self {
                self.config = self.config.base_url(url);
                self
            }

            /// Add a header sent on every call.
            #[must_use]
            pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
                self.config = self.config.default_header(name, value);
                self
            }

            /// Add a query parameter sent on every call.
            #[must_use]
            pub fn default_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
                self.config = self.config.default_query(name, value);
                self
            }

            /// Proxy for routes without their own.
            #[must_use]
            pub fn proxy(mut self, proxy: impl Into<::courier::Proxy>) -> Self {
                self.config = self.config.proxy(proxy);
                self
            }

            /// Credentials sent as the `Authorization` header.
            #[must_use]
            pub fn auth(mut self, auth: ::courier::Auth) -> Self {
                self.config = self.config.auth(auth);
                self
            }

            /// Timeout for routes without their own.
            #[must_use]
            pub fn timeout(mut self, timeout: ::std::time::Duration) -> Self {
                self.config = self.config.timeout(timeout);
                self
            }

            /// Build the client with its default transport.
            pub fn build(self) -> ::courier::Result<#client_name> {
                self.build_with(#new_transport)
            }

            /// Build the client over a custom transport.
            pub fn build_with<C>(self, transport: C) -> ::courier::Result<#client_name<C>> {
                Ok(#client_name {
                    inner: ::courier::ApiClient::new(transport, self.config.build()?),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    fn shape(output: syn::ReturnType) -> ReturnShape {
        analyze_return_type(&output).expect("shape")
    }

    #[test]
    fn return_shapes() {
        assert_eq!(shape(parse_quote!(-> courier::Result<()>)), ReturnShape::Unit);
        assert_eq!(shape(parse_quote!(-> courier::Result<Response>)), ReturnShape::Raw);
        assert_eq!(
            shape(parse_quote!(-> Result<serde_json::Map<String, serde_json::Value>>)),
            ReturnShape::Mapping
        );
        assert_eq!(shape(parse_quote!(-> Result<Vec<User>>)), ReturnShape::Sequence);
        assert_eq!(shape(parse_quote!(-> Result<User>)), ReturnShape::Model);
        assert!(analyze_return_type(&parse_quote!(-> User)).is_err());
        assert!(analyze_return_type(&syn::ReturnType::Default).is_err());
    }

    #[test]
    fn argument_conversions() {
        let param = |ty: Type, kind: ParamKind| MethodParam {
            name: parse_quote!(x),
            ty,
            kind,
            default: None,
        };
        let tokens = |p: &MethodParam| arg_value_expr(p).to_string();

        assert!(tokens(&param(parse_quote!(&str), ParamKind::Body)).contains("from"));
        assert!(tokens(&param(parse_quote!(Option<String>), ParamKind::Unmarked)).contains("from"));
        assert!(tokens(&param(parse_quote!(Duration), ParamKind::Timeout)).contains("from"));
        assert!(tokens(&param(parse_quote!(u64), ParamKind::Unmarked)).contains("json"));
        assert!(tokens(&param(parse_quote!(&User), ParamKind::Body)).contains("json"));
        assert!(tokens(&param(parse_quote!(Vec<Part>), ParamKind::Files)).contains("from"));
        assert!(
            tokens(&param(parse_quote!(Vec<(&str, &str)>), ParamKind::Files)).contains("files")
        );
    }

    #[test]
    fn param_declarations() {
        let param = MethodParam {
            name: parse_quote!(resource_name),
            ty: parse_quote!(Option<&str>),
            kind: ParamKind::Path(Some("resource".to_string())),
            default: Some(parse_quote!("posts")),
        };
        insta::assert_snapshot!(
            param_decl(&param).to_string(),
            @r#":: courier :: Param :: path_as ("resource_name" , "resource") . default ("posts")"#
        );
    }
}
