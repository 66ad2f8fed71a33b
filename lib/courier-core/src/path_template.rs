//! Path templates with `{name}` placeholders.
//!
//! A template is parsed once when the route is registered. Rendering
//! substitutes percent-encoded values, so a value like `a b/c` becomes the
//! single segment `a%20b%2Fc`.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::ConfigError;

/// Characters encoded inside a path segment. Unreserved characters and
/// sub-delimiters stay as they are.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed path template such as `users/{user_id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template.
    ///
    /// Placeholders must be non-empty, unique, and made of ASCII letters,
    /// digits and underscores. Braces must balance.
    pub fn parse(template: impl Into<String>) -> Result<Self, ConfigError> {
        let source = template.into();
        let malformed = |reason: &str| ConfigError::MalformedTemplate {
            template: source.clone(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        if inner == '{' {
                            return Err(malformed("nested '{'"));
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(malformed("unclosed '{'"));
                    }
                    if name.is_empty() {
                        return Err(malformed("empty placeholder"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(malformed("placeholder names use letters, digits and '_'"));
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Placeholder(n) if *n == name))
                    {
                        return Err(malformed("duplicate placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(malformed("unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// The template text as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns `true` if the template has a placeholder called `name`.
    #[must_use]
    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Substitute percent-encoded values into the placeholders.
    ///
    /// Returns the name of the first placeholder without a value as the error.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, String> {
        let mut path = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values.get(name).ok_or_else(|| name.clone())?;
                    path.extend(utf8_percent_encode(value, PATH_SEGMENT_ENCODE_SET));
                }
            }
        }
        Ok(path)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.source
    }
}
