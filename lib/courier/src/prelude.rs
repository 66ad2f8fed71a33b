//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::{
    ApiClient, Auth, BlockingHttpClient, BlockingHyperClient, ClientConfig, Error, HttpClient,
    HyperClient, Method, Part, Proxy, ProxyConfig, Response, Result, courier, delete, get, head,
    http, options, patch, post, put,
};
pub use serde::{Deserialize, Serialize};
