//! Procedural macros for the courier declarative HTTP client.
//!
//! - `#[courier]` - turn a trait into a route table, a client and its builder
//! - `#[get]`, `#[post]`, `#[put]`, `#[delete]`, `#[patch]`, `#[head]`, `#[options]` - routes
//! - `#[http("VERB path")]` - route with the verb spelled out
//!
//! Inside a `#[courier]` trait the route attributes are read by `#[courier]`
//! itself. On a free function they declare a standalone route, which must
//! carry its own `base_url`.
//!
//! Parameter markers: `#[path]` / `#[path("placeholder")]`, `#[query]`,
//! `#[header]` / `#[header("Name")]`, `#[body]`, `#[field]` / `#[field("key")]`,
//! `#[files]`, `#[timeout]` and `#[default(expr)]`. Unmarked parameters bind
//! to the placeholder of the same name, or are sent as query parameters.
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! #[courier(base_url = "https://jsonplaceholder.typicode.com")]
//! pub trait JsonPlaceholder {
//!     #[get("users/{user_id}")]
//!     async fn get_user(&self, user_id: u64) -> courier::Result<User>;
//! }
//!
//! let client = JsonPlaceholderClient::builder().build()?;
//! let user = client.get_user(1).await?;
//! ```

mod attrs;
mod codegen;
mod expand;

use proc_macro::TokenStream;

use crate::attrs::HttpMethod;

/// Turn a trait into a declarative HTTP client.
///
/// For a trait `Api` this generates:
/// - the trait itself, without courier attributes
/// - `ApiRoutes::registry()`, the routes registered once per process
/// - `ApiClient<C>`, one client instance (transport + configuration)
/// - `ApiClientBuilder`, seeded with the defaults given here
///
/// All methods are `async fn` (served by `HyperClient`) or all are plain
/// `fn` (served by `BlockingHyperClient`).
///
/// # Attributes
///
/// - `base_url` (optional): default base URL of every instance
/// - `proxies` (optional): default proxy
/// - `timeout` (optional): default timeout in seconds
///
/// # Method attributes
///
/// - a route: `#[get("users/{id}", timeout = 2, base_url = "...", proxies = "...")]`
/// - `#[rate_limit(max_calls = 1, interval = 1)]`: shared by every instance
///
/// # Example
///
/// ```ignore
/// #[courier(base_url = "https://reqres.in/api", timeout = 5)]
/// pub trait Reqres {
///     #[put("users/{user_id}")]
///     async fn update(&self, user_id: u64, #[field] name: &str, #[field] job: &str)
///         -> courier::Result<serde_json::Map<String, serde_json::Value>>;
/// }
/// ```
#[proc_macro_attribute]
pub fn courier(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_courier_trait(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone GET route.
///
/// # Example
///
/// ```ignore
/// #[get("users/{id}", base_url = "https://jsonplaceholder.typicode.com")]
/// pub async fn get_user(id: u64) -> courier::Result<User>;
/// ```
#[proc_macro_attribute]
pub fn get(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Get, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone POST route.
///
/// # Example
///
/// ```ignore
/// #[post("post", base_url = "https://postman-echo.com")]
/// pub async fn upload(#[files] files: Vec<Part>) -> courier::Result<Response>;
/// ```
#[proc_macro_attribute]
pub fn post(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Post, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone PUT route.
#[proc_macro_attribute]
pub fn put(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Put, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone DELETE route.
#[proc_macro_attribute]
pub fn delete(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Delete, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone PATCH route.
#[proc_macro_attribute]
pub fn patch(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Patch, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone HEAD route.
#[proc_macro_attribute]
pub fn head(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Head, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone OPTIONS route.
#[proc_macro_attribute]
pub fn options(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_http_method(HttpMethod::Options, attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Declare a standalone route with the verb in the template.
///
/// `#[rate_limit(...)]` goes below the route attribute.
///
/// # Example
///
/// ```ignore
/// #[http("GET users/{id}", base_url = "https://jsonplaceholder.typicode.com")]
/// #[rate_limit(max_calls = 10, interval = 1)]
/// pub fn get_user(id: u64) -> courier::Result<User>;
/// ```
#[proc_macro_attribute]
pub fn http(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_custom_http(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
