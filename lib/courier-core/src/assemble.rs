//! Request assembly.
//!
//! Turns a route, a call's bound values and its effective configuration into
//! an immutable [`Request`]. No I/O happens here.

use serde_json::Value;
use tracing::trace;

use crate::binding::BoundBody;
use crate::body::parse_text;
use crate::{
    ArgValue, BindingFault, CallContext, EffectiveConfig, Error, Form, Request, Result,
    RouteDescriptor, Stage,
};

const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Build the request of one call.
///
/// - placeholders receive their percent-encoded values
/// - merged query parameters are appended in key order
/// - merged headers are applied, then instance credentials unless the call
///   set `authorization` itself
/// - the body follows the bound role: a whole body is used as JSON (text is
///   parsed first), fields are merged into one object, files become multipart
pub fn assemble(
    route: &RouteDescriptor,
    ctx: &CallContext,
    effective: &EffectiveConfig,
) -> Result<Request> {
    let path = route.template().render(ctx.path()).map_err(|placeholder| {
        Error::validation(Stage::Binding, BindingFault::Missing(placeholder))
    })?;
    let url = effective
        .base_url()
        .join(path.trim_start_matches('/'))?;

    let query = effective
        .query()
        .iter()
        .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())));

    let mut builder = Request::builder(route.method(), url)
        .query_pairs(query)
        .header("user-agent", USER_AGENT)
        .header("accept", "application/json")
        .headers(effective.headers().clone());
    if let Some(auth) = effective.auth() {
        builder = builder.header_if_absent("authorization", auth.header_value());
    }

    builder = match ctx.body() {
        None => builder,
        Some(BoundBody::Whole(value)) => builder.json(&whole_body(value)?)?,
        Some(BoundBody::Fields(fields)) => builder.json(fields)?,
        Some(BoundBody::Files(parts)) => {
            builder.multipart(Form::new().parts_from(parts.iter().cloned()))
        }
    };

    let request = builder
        .timeout(effective.timeout())
        .proxy(effective.proxy().cloned())
        .build();
    trace!(method = %request.method(), url = %request.url(), "assembled request");
    Ok(request)
}

fn whole_body(value: &ArgValue) -> Result<Value> {
    match value {
        ArgValue::Json(json) => Ok(json.clone()),
        ArgValue::Text(text) => parse_text(text),
        other => Err(Error::validation(
            Stage::Body,
            BindingFault::Mismatch {
                param: "body".to_string(),
                expected: "a JSON value or text",
                found: other.kind(),
            },
        )),
    }
}
