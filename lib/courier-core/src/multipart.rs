//! Multipart form encoding for file-upload parameters.
//!
//! A file-upload argument is a map of field name to binary content. Each entry
//! becomes one [`Part`]; the parts are framed into a `multipart/form-data` body
//! by [`Form`].
//!
//! ```
//! use courier_core::{Form, Part};
//!
//! let form = Form::with_boundary("xyz")
//!     .part(Part::upload("report.csv", "a,b\n1,2\n"));
//! let (content_type, body) = form.into_body();
//! assert_eq!(content_type, "multipart/form-data; boundary=xyz");
//! assert!(body.starts_with(b"--xyz\r\n"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

/// One uploaded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Upload `data` under the field `name`.
    ///
    /// The field name doubles as the filename, and the content type is
    /// guessed from its extension.
    #[must_use]
    pub fn upload(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        Self {
            content_type: Some(guess_content_type(&name).to_string()),
            filename: Some(name.clone()),
            name,
            data: data.into(),
        }
    }

    /// A plain text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            data: Bytes::from(value.into()),
        }
    }

    /// Set the filename for this part.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        self.content_type = Some(guess_content_type(&filename).to_string());
        self.filename = Some(filename);
        self
    }

    /// Set the content type for this part.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw content.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return "application/octet-stream";
    };
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone)]
pub struct Form {
    parts: Vec<Part>,
    boundary: String,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// An empty form with a fresh boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// An empty form with a fixed boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            boundary: boundary.into(),
        }
    }

    /// Add a part.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Add several parts, keeping their order.
    #[must_use]
    pub fn parts_from(mut self, parts: impl IntoIterator<Item = Part>) -> Self {
        self.parts.extend(parts);
        self
    }

    /// Boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Parts in this form.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// `Content-Type` header value announcing the boundary.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Consume into (content-type header value, encoded body).
    #[must_use]
    pub fn into_body(self) -> (String, Bytes) {
        let content_type = self.content_type();
        (content_type, self.encode())
    }

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            put_quoted(&mut buf, &part.name);
            buf.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                buf.put_slice(b"; filename=\"");
                put_quoted(&mut buf, filename);
                buf.put_slice(b"\"");
            }
            buf.put_slice(b"\r\n");

            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }

            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        buf.freeze()
    }
}

/// Quoted-string values escape `"`, CR and LF the way browsers do.
fn put_quoted(buf: &mut BytesMut, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'"' => buf.put_slice(b"%22"),
            b'\r' => buf.put_slice(b"%0D"),
            b'\n' => buf.put_slice(b"%0A"),
            other => buf.put_u8(other),
        }
    }
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("----CourierBoundary{timestamp:x}{sequence:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_part_uses_field_name_as_filename() {
        let part = Part::upload("avatar.png", vec![0x89, 0x50]);
        assert_eq!(part.name(), "avatar.png");
        assert_eq!(part.filename(), Some("avatar.png"));
        assert_eq!(part.content_type(), Some("image/png"));

        let part = Part::upload("file", "plain");
        assert_eq!(part.content_type(), Some("application/octet-stream"));
    }

    #[test]
    fn part_modifiers() {
        let part = Part::upload("file", "data")
            .with_filename("notes.TXT")
            .with_content_type("text/x-notes");
        assert_eq!(part.filename(), Some("notes.TXT"));
        assert_eq!(part.content_type(), Some("text/x-notes"));
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(Form::new().boundary(), Form::new().boundary());
        assert!(Form::new().boundary().starts_with("----CourierBoundary"));
    }

    #[test]
    fn form_encode() {
        let form = Form::with_boundary("b0")
            .part(Part::text("name", "John"))
            .part(Part::upload("cv.txt", "hello"));

        let (content_type, body) = form.into_body();
        assert_eq!(content_type, "multipart/form-data; boundary=b0");

        let expected = "--b0\r\n\
            Content-Disposition: form-data; name=\"name\"\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            John\r\n\
            --b0\r\n\
            Content-Disposition: form-data; name=\"cv.txt\"; filename=\"cv.txt\"\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            hello\r\n\
            --b0--\r\n";
        assert_eq!(String::from_utf8_lossy(&body), expected);
    }

    #[test]
    fn form_escapes_quotes_in_names() {
        let (_, body) = Form::with_boundary("b1")
            .part(Part::upload("we\"ird", "x"))
            .into_body();
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("name=\"we%22ird\"; filename=\"we%22ird\""));
    }

    #[test]
    fn guess_content_type_common() {
        assert_eq!(guess_content_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("doc.pdf"), "application/pdf");
        assert_eq!(guess_content_type("data.json"), "application/json");
        assert_eq!(guess_content_type("noext"), "application/octet-stream");
    }
}
