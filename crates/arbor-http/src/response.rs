//! Transport-neutral response shape.
//!
//! A `Response` is assembled inside the per-request context and returned
//! to the transport adapter, which writes it to the wire. The body is
//! either a contiguous buffer or a stream of chunks.

use std::fmt;
use std::io;

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::headers::Headers;
use crate::status::status_text;

/// A response body.
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// A chunked body produced asynchronously, e.g. a file or an SSE feed.
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

/// An outgoing HTTP response.
#[derive(Debug)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Creates an empty response with the reason phrase taken from the
    /// standard table.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: status_text(status).to_string(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// A `text/plain` response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=UTF-8")
            .with_body(Bytes::from(body.into()))
    }

    /// A `text/html` response.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/html; charset=UTF-8")
            .with_body(Bytes::from(body.into()))
    }

    /// An `application/json` response serialized from `value`.
    pub fn json(status: u16, value: &serde_json::Value) -> crate::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(Bytes::from(body)))
    }

    /// A redirect to `location`.
    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        Self::new(status).with_header("Location", location)
    }

    /// The default body for an unmatched route.
    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    /// The default body for an unhandled error.
    pub fn internal_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self.status_text = status_text(status).to_string();
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends every entry of `headers`.
    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Bytes(body.into());
        self
    }

    pub fn with_stream(mut self, stream: BoxStream<'static, io::Result<Bytes>>) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// The body buffer, when the body is not streamed.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// UTF-8 view of the body buffer, mostly useful in tests.
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}
