//! Macro expansion logic for courier.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Block, FnArg, Ident, ItemTrait, Pat, Signature, Token, TraitItem, Visibility, parse2};

use crate::attrs::{
    ClientArgs, HttpMethod, MethodParam, ParamKind, RouteArgs, RouteAttr, extract_path_placeholders,
    find_rate_limit, find_route_attr, is_param_attr, parse_param,
};
use crate::codegen::{
    ReturnShape, analyze_return_type, args_code, client_call, generate_client, route_builder,
    standalone_call,
};

/// Method attributes consumed by the macros.
const ROUTE_ATTRS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "http", "rate_limit",
];

fn is_route_attr(attr: &Attribute) -> bool {
    ROUTE_ATTRS.iter().any(|name| attr.path().is_ident(name))
}

/// A route method, parsed once.
struct RouteMethod {
    sig: Signature,
    attrs: Vec<Attribute>,
    route: RouteAttr,
    rate_limit: Option<crate::attrs::RateLimitAttr>,
    params: Vec<MethodParam>,
    shape: ReturnShape,
}

impl RouteMethod {
    fn parse(sig: &Signature, attrs: &[Attribute], route: RouteAttr) -> syn::Result<Self> {
        let rate_limit = find_rate_limit(attrs)?;
        let shape = analyze_return_type(&sig.output)?;
        let params = parse_params(sig)?;
        check_path_aliases(&route.path, &params, sig)?;
        Ok(Self {
            sig: strip_param_attrs(sig),
            attrs: attrs
                .iter()
                .filter(|a| !is_route_attr(a))
                .cloned()
                .collect(),
            route,
            rate_limit,
            params,
            shape,
        })
    }

    fn is_async(&self) -> bool {
        self.sig.asyncness.is_some()
    }

    fn builder(&self, owner: &TokenStream) -> TokenStream {
        route_builder(
            owner,
            &self.sig.ident,
            &self.route,
            self.rate_limit.as_ref(),
            &self.params,
            self.shape,
        )
    }
}

fn parse_params(sig: &Signature) -> syn::Result<Vec<MethodParam>> {
    sig.inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat_type) => Some(pat_type),
            FnArg::Receiver(_) => None,
        })
        .map(|pat_type| {
            let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
                return Err(syn::Error::new_spanned(
                    &pat_type.pat,
                    "route parameters must be plain identifiers",
                ));
            };
            parse_param(pat_ident.ident.clone(), (*pat_type.ty).clone(), &pat_type.attrs)
        })
        .collect()
}

/// `#[path("name")]` must name an existing placeholder.
fn check_path_aliases(template: &str, params: &[MethodParam], sig: &Signature) -> syn::Result<()> {
    let placeholders = extract_path_placeholders(template);
    for param in params {
        if let ParamKind::Path(alias) = &param.kind {
            let target = alias.clone().unwrap_or_else(|| param.name.to_string());
            if !placeholders.contains(&target) {
                return Err(syn::Error::new_spanned(
                    &sig.ident,
                    format!(
                        "path parameter '{}' targets {{{target}}}, which is not in \"{template}\" (available: {placeholders:?})",
                        param.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn strip_param_attrs(sig: &Signature) -> Signature {
    let mut clean = sig.clone();
    for input in &mut clean.inputs {
        if let FnArg::Typed(pat_type) = input {
            pat_type.attrs.retain(|attr| !is_param_attr(attr));
        }
    }
    clean
}

// ============================================================================
// #[courier] on a trait
// ============================================================================

/// Expand the `#[courier]` attribute on a trait.
pub(crate) fn expand_courier_trait(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let trait_def: ItemTrait = parse2(item)?;
    let defaults: ClientArgs = parse2(attr)?;

    let trait_name = &trait_def.ident;
    let vis = &trait_def.vis;
    let methods = extract_trait_methods(&trait_def)?;

    let is_async = methods.first().is_none_or(RouteMethod::is_async);
    if let Some(odd) = methods.iter().find(|m| m.is_async() != is_async) {
        return Err(syn::Error::new_spanned(
            &odd.sig,
            "a #[courier] trait is either all `async fn` or all blocking `fn`",
        ));
    }

    let owner = quote! { owner };
    let registrations: Vec<_> = methods.iter().map(|m| m.builder(&owner)).collect();
    let clean_trait = generate_clean_trait(&trait_def, &methods);
    let client = generate_client(vis, trait_name, is_async, &defaults, &registrations);
    let trait_impl = generate_trait_impl(trait_name, &methods, is_async);

    Ok(quote! {
        #clean_trait
        #client
        #trait_impl
    })
}

fn extract_trait_methods(trait_def: &ItemTrait) -> syn::Result<Vec<RouteMethod>> {
    let mut methods = Vec::new();
    for item in &trait_def.items {
        let TraitItem::Fn(method) = item else {
            return Err(syn::Error::new_spanned(
                item,
                "a #[courier] trait only declares route methods",
            ));
        };
        if method.default.is_some() {
            return Err(syn::Error::new_spanned(
                &method.default,
                "route methods have no body",
            ));
        }
        if !matches!(method.sig.inputs.first(), Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none())
        {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "route methods take `&self`",
            ));
        }
        let route = find_route_attr(&method.attrs)?.ok_or_else(|| {
            syn::Error::new_spanned(
                &method.sig.ident,
                "missing route attribute: #[get(\"...\")], #[post(\"...\")], ... or #[http(\"VERB ...\")]",
            )
        })?;
        methods.push(RouteMethod::parse(&method.sig, &method.attrs, route)?);
    }
    Ok(methods)
}

/// The trait without courier attributes.
fn generate_clean_trait(original: &ItemTrait, methods: &[RouteMethod]) -> TokenStream {
    let vis = &original.vis;
    let name = &original.ident;
    let trait_attrs = original.attrs.iter().filter(|a| {
        let path = a.path();
        path.is_ident("doc") || path.is_ident("allow") || path.is_ident("cfg")
    });
    let signatures = methods.iter().map(|m| {
        let attrs = &m.attrs;
        let sig = &m.sig;
        quote! {
            #(#attrs)*
            #sig;
        }
    });

    quote! {
        #(#trait_attrs)*
        #[allow(async_fn_in_trait)]
        #vis trait #name {
            #(#signatures)*
        }
    }
}

fn generate_trait_impl(trait_name: &Ident, methods: &[RouteMethod], is_async: bool) -> TokenStream {
    let routes_name = format_ident!("{}Routes", trait_name);
    let client_name = format_ident!("{}Client", trait_name);
    let bound = if is_async {
        quote! { ::courier::HttpClient }
    } else {
        quote! { ::courier::BlockingHttpClient }
    };

    let impls = methods.iter().map(|m| {
        let sig = &m.sig;
        let name = m.sig.ident.to_string();
        let args = args_code(&m.params);
        let call = client_call(is_async, m.shape);
        quote! {
            #sig {
                let __courier_route = #routes_name::registry().get(#name)?;
                #args
                #call
            }
        }
    });

    quote! {
        impl<C: #bound> #trait_name for #client_name<C> {
            #(#impls)*
        }
    }
}

// ============================================================================
// Standalone functions
// ============================================================================

/// A free function declaration, with or without a body.
struct StandaloneFn {
    attrs: Vec<Attribute>,
    vis: Visibility,
    sig: Signature,
}

impl Parse for StandaloneFn {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let sig: Signature = input.parse()?;
        if input.peek(Token![;]) {
            input.parse::<Token![;]>()?;
        } else {
            input.parse::<Block>()?;
        }
        Ok(Self { attrs, vis, sig })
    }
}

/// Expand a verb attribute on a standalone function.
pub(crate) fn expand_http_method(
    method: HttpMethod,
    attr: TokenStream,
    item: TokenStream,
) -> syn::Result<TokenStream> {
    let args: RouteArgs = parse2(attr)?;
    generate_standalone(RouteAttr::from_verb_args(method, args), item)
}

/// Expand `#[http("VERB path")]` on a standalone function.
pub(crate) fn expand_custom_http(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args: RouteArgs = parse2(attr)?;
    generate_standalone(RouteAttr::from_http_args(args)?, item)
}

fn generate_standalone(route: RouteAttr, item: TokenStream) -> syn::Result<TokenStream> {
    let function: StandaloneFn = parse2(item)?;
    if let Some(FnArg::Receiver(receiver)) = function.sig.inputs.first() {
        return Err(syn::Error::new_spanned(
            receiver,
            "standalone routes are free functions; declare methods inside a #[courier] trait",
        ));
    }
    if route.options.base_url.is_none() {
        return Err(syn::Error::new_spanned(
            &function.sig.ident,
            "standalone routes need `base_url = \"...\"`",
        ));
    }

    let method = RouteMethod::parse(&function.sig, &function.attrs, route)?;
    let owner = quote! { owner };
    let builder = method.builder(&owner);
    let args = args_code(&method.params);
    let call = standalone_call(method.is_async(), method.shape);
    let attrs = &method.attrs;
    let vis = &function.vis;
    let sig = &method.sig;
    let fn_name = sig.ident.to_string();

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            static ROUTE: ::std::sync::LazyLock<
                ::std::result::Result<::courier::RouteDescriptor, ::courier::ConfigError>,
            > = ::std::sync::LazyLock::new(|| {
                let owner = concat!(module_path!(), "::", #fn_name);
                #builder.standalone().build()
            });
            let __courier_route = ROUTE
                .as_ref()
                .map_err(|err| ::courier::Error::Config(err.clone()))?;
            #args
            #call
        }
    })
}
