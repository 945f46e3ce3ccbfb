//! Transport-neutral request shape.
//!
//! A transport adapter builds one `Request` per incoming HTTP request and
//! hands it to the server core. The body has already been collected into a
//! contiguous buffer by the adapter; the core parses it lazily on demand.

use bytes::Bytes;

use crate::headers::Headers;
use crate::method::Method;

/// An incoming HTTP request as seen by the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Bytes,
}

/// The decomposed request target: path, raw query string and fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub hash: Option<&'a str>,
}

impl Request {
    /// Creates a request for `url`, which may be an absolute URL or an
    /// origin-form target such as `/users/42?expand=1`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a request header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Splits the request URL into path, query and fragment.
    pub fn target(&self) -> Target<'_> {
        split_target(&self.url)
    }
}

/// Splits a request URL into its path, raw query string and fragment.
///
/// Absolute URLs have their scheme and authority stripped first; an URL
/// with no path component yields `/`.
pub fn split_target(url: &str) -> Target<'_> {
    let after_authority = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    };

    let (before_hash, hash) = match after_authority.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (after_authority, None),
    };
    let (path, query) = match before_hash.split_once('?') {
        Some((head, query)) => (head, Some(query)),
        None => (before_hash, None),
    };

    Target {
        path: if path.is_empty() { "/" } else { path },
        query,
        hash,
    }
}
