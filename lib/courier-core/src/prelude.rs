//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    ArgValue, Args, Auth, BlockingHttpClient, ClientConfig, Decoded, Error, HttpClient, Method,
    Param, Proxy, Request, Response, ResponseShape, Result, RouteBuilder, RouteDescriptor,
};
