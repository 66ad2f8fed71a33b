//! Response decoding by declared return shape.
//!
//! The shape of a route is fixed when it is declared. [`decode`] does the
//! untyped half of the work (status check, JSON parse, top-level kind check)
//! and returns a [`Decoded`] value; the typed half (building `T` from the
//! parsed JSON) happens in [`Decoded::into_model`] and
//! [`Decoded::into_sequence`], where the caller names the type.

use derive_more::Display;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::body::{from_json, from_value, kind_of};
use crate::{ConfigError, Error, Response, Result, ShapeFault, Stage};

/// What a route's response decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResponseShape {
    /// The response itself, whatever its status.
    #[display("raw response")]
    Raw,
    /// A JSON object.
    #[display("mapping")]
    Mapping,
    /// A JSON array, one model per element.
    #[display("sequence")]
    Sequence,
    /// A single model.
    #[display("model")]
    Model,
}

/// A response decoded into its route's shape, before typing.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The untouched response.
    Raw(Response),
    /// A parsed JSON object.
    Mapping(Map<String, Value>),
    /// Parsed JSON array elements.
    Sequence(Vec<Value>),
    /// Parsed JSON value to build a model from.
    Model(Value),
}

/// Decode `response` into `shape`.
///
/// Non-raw shapes require a 2xx status and yield [`Error::Http`] otherwise.
/// Unparsable bodies and wrong top-level kinds are decode validation errors.
pub fn decode(shape: ResponseShape, response: Response) -> Result<Decoded> {
    if shape == ResponseShape::Raw {
        return Ok(Decoded::Raw(response));
    }
    if !response.is_success() {
        let (status, _, body) = response.into_parts();
        return Err(Error::http(status, body));
    }

    let value: Value = from_json(response.body())?;
    match (shape, value) {
        (ResponseShape::Mapping, Value::Object(map)) => Ok(Decoded::Mapping(map)),
        (ResponseShape::Sequence, Value::Array(items)) => Ok(Decoded::Sequence(items)),
        (ResponseShape::Model, value) => Ok(Decoded::Model(value)),
        (ResponseShape::Mapping, other) => Err(wrong_kind("object", &other)),
        (_, other) => Err(wrong_kind("array", &other)),
    }
}

fn wrong_kind(expected: &'static str, value: &Value) -> Error {
    Error::validation(
        Stage::Decode,
        ShapeFault {
            expected,
            found: kind_of(value),
        },
    )
}

impl Decoded {
    fn shape(&self) -> ResponseShape {
        match self {
            Self::Raw(_) => ResponseShape::Raw,
            Self::Mapping(_) => ResponseShape::Mapping,
            Self::Sequence(_) => ResponseShape::Sequence,
            Self::Model(_) => ResponseShape::Model,
        }
    }

    fn mismatch(&self, expected: ResponseShape) -> Error {
        Error::Config(ConfigError::ShapeMismatch {
            expected,
            found: self.shape(),
        })
    }

    /// The raw response.
    pub fn into_response(self) -> Result<Response> {
        match self {
            Self::Raw(response) => Ok(response),
            other => Err(other.mismatch(ResponseShape::Raw)),
        }
    }

    /// Check for a 2xx status and drop the body.
    pub fn into_unit(self) -> Result<()> {
        let response = self.into_response()?;
        if response.is_success() {
            Ok(())
        } else {
            let (status, _, body) = response.into_parts();
            Err(Error::http(status, body))
        }
    }

    /// The parsed JSON object.
    pub fn into_mapping(self) -> Result<Map<String, Value>> {
        match self {
            Self::Mapping(map) => Ok(map),
            other => Err(other.mismatch(ResponseShape::Mapping)),
        }
    }

    /// One `T` per array element.
    pub fn into_sequence<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        match self {
            Self::Sequence(items) => from_value(Value::Array(items)),
            other => Err(other.mismatch(ResponseShape::Sequence)),
        }
    }

    /// A single `T` built from the parsed value.
    pub fn into_model<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Model(value) => from_value(value),
            other => Err(other.mismatch(ResponseShape::Model)),
        }
    }
}
