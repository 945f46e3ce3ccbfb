//! Per-request context.
//!
//! Owns the request, the lazily parsed body, the captured parameters and
//! query, and the accumulating response headers. Response builders merge
//! the accumulated headers, supply the canonical content type when none
//! was set, and record the status of the most recent build. Exactly one
//! context exists per request and it never leaves the dispatch task.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_http::body::{self, FormData, ParsedBody};
use arbor_http::cookie::{self, CookieOptions};
use arbor_http::{Headers, HttpException, Request, Response, Result};
use arbor_router::Params;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// The server-wide shared value map, readable from every request.
///
/// Plugins conventionally own distinct key spaces; the framework imposes
/// no locking discipline beyond the map itself.
#[derive(Clone, Default)]
pub struct Globals(Arc<RwLock<HashMap<String, serde_json::Value>>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, serde_json::Value>> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, serde_json::Value>> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.write().insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// A read-only handle onto the same map.
    pub fn view(&self) -> GlobalsView {
        GlobalsView(self.clone())
    }
}

/// Read-only view of the server-wide map, what request handlers see.
///
/// Writing is a server/plugin affair: the mutable [`Globals`] handle is
/// only reachable through `Server::globals` and the plugin init context.
#[derive(Clone)]
pub struct GlobalsView(Globals);

impl GlobalsView {
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }
}

enum BodyCache {
    Unparsed,
    Parsed(ParsedBody),
    /// The body failed to decode; accessors re-raise the 400 sentinel.
    Invalid,
}

fn invalid_body() -> arbor_http::ArborError {
    HttpException::new(400, "Invalid JSON").into()
}

/// Per-request state handed to every handler in the chain.
pub struct Context {
    request: Request,
    params: Params,
    query: Vec<(String, String)>,
    matched_path: Option<String>,
    headers: Headers,
    status: u16,
    locals: HashMap<String, serde_json::Value>,
    globals: Globals,
    env: crate::env::Env,
    body: BodyCache,
}

impl Context {
    pub(crate) fn new(
        request: Request,
        params: Params,
        query: Vec<(String, String)>,
        matched_path: Option<String>,
        globals: Globals,
        env: crate::env::Env,
    ) -> Self {
        Self {
            request,
            params,
            query,
            matched_path,
            headers: Headers::new(),
            status: 200,
            locals: HashMap::new(),
            globals,
            env,
            body: BodyCache::Unparsed,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The route pattern that matched, when one did.
    pub fn matched_path(&self) -> Option<&str> {
        self.matched_path.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn queries(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The URL fragment, when the transport passed one through.
    pub fn hash(&self) -> Option<&str> {
        self.request.target().hash
    }

    /// The status set by the most recent response builder call.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The accumulated response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn env(&self) -> &crate::env::Env {
        &self.env
    }

    /// Read-only view of the server-wide map.
    pub fn globals(&self) -> GlobalsView {
        self.globals.view()
    }

    pub fn global(&self, key: &str) -> Option<serde_json::Value> {
        self.globals.get(key)
    }

    pub fn local(&self, key: &str) -> Option<&serde_json::Value> {
        self.locals.get(key)
    }

    pub fn set_local(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.locals.insert(key.into(), value);
        self
    }

    // -- request body -----------------------------------------------------

    fn parsed_body(&mut self) -> Result<&ParsedBody> {
        if matches!(self.body, BodyCache::Unparsed) {
            let content_type = self.request.header("Content-Type").map(str::to_string);
            self.body = match body::parse(content_type.as_deref(), self.request.body()) {
                Ok(parsed) => BodyCache::Parsed(parsed),
                Err(_) => BodyCache::Invalid,
            };
        }
        match &self.body {
            BodyCache::Parsed(parsed) => Ok(parsed),
            _ => Err(invalid_body()),
        }
    }

    /// The decoded `multipart/form-data` body, when that is what arrived.
    pub fn form_data(&mut self) -> Result<Option<&FormData>> {
        Ok(match self.parsed_body()? {
            ParsedBody::Multipart(form) => Some(form),
            _ => None,
        })
    }

    /// The decoded urlencoded form, when that is what arrived.
    pub fn url_encoded(&mut self) -> Result<Option<&HashMap<String, String>>> {
        Ok(match self.parsed_body()? {
            ParsedBody::UrlEncoded(map) => Some(map),
            _ => None,
        })
    }

    /// The decoded JSON body, when that is what arrived. A malformed JSON
    /// body surfaces as the `400 Invalid JSON` sentinel.
    pub fn json_body(&mut self) -> Result<Option<&serde_json::Value>> {
        Ok(match self.parsed_body()? {
            ParsedBody::Json(value) => Some(value),
            _ => None,
        })
    }

    // -- response assembly ------------------------------------------------

    /// Appends a response header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    /// Appends a list-valued response header as one comma-joined entry.
    pub fn set_header_values(&mut self, name: impl Into<String>, values: &[&str]) -> &mut Self {
        self.headers.append_joined(name, values);
        self
    }

    /// Appends a `Set-Cookie` header via the strict cookie codec.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<&mut Self> {
        let serialized = cookie::serialize(name, value, options)?;
        self.headers.append("Set-Cookie", serialized);
        Ok(self)
    }

    /// Appends one `Set-Cookie` header per pair, sharing `options`.
    pub fn set_cookies(
        &mut self,
        pairs: &[(&str, &str)],
        options: &CookieOptions,
    ) -> Result<&mut Self> {
        for (name, value) in pairs {
            self.set_cookie(name, value, options)?;
        }
        Ok(self)
    }

    /// Cookies sent with the request, first occurrence of each name.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.request
            .header("Cookie")
            .map(cookie::parse)
            .unwrap_or_default()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn assemble(&mut self, status: u16, content_type: &str, extra: &Headers) -> Response {
        self.status = status;
        let mut headers = self.headers.clone();
        headers.merge(extra);
        if !headers.contains("Content-Type") {
            headers.append("Content-Type", content_type);
        }
        Response::new(status).with_headers(&headers)
    }

    /// A `text/plain` response with status 200.
    pub fn text(&mut self, body: impl Into<String>) -> Response {
        self.text_with(body, 200, &Headers::new())
    }

    pub fn text_with(&mut self, body: impl Into<String>, status: u16, extra: &Headers) -> Response {
        self.assemble(status, "text/plain; charset=UTF-8", extra)
            .with_body(Bytes::from(body.into()))
    }

    /// A `text/html` response with status 200.
    pub fn html(&mut self, body: impl Into<String>) -> Response {
        self.html_with(body, 200, &Headers::new())
    }

    pub fn html_with(&mut self, body: impl Into<String>, status: u16, extra: &Headers) -> Response {
        self.assemble(status, "text/html; charset=UTF-8", extra)
            .with_body(Bytes::from(body.into()))
    }

    /// An `application/json` response with status 200.
    pub fn json(&mut self, value: &serde_json::Value) -> Result<Response> {
        self.json_with(value, 200, &Headers::new())
    }

    pub fn json_with(
        &mut self,
        value: &serde_json::Value,
        status: u16,
        extra: &Headers,
    ) -> Result<Response> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .assemble(status, "application/json", extra)
            .with_body(Bytes::from(body)))
    }

    /// A redirect with status 302.
    pub fn redirect(&mut self, location: impl Into<String>) -> Response {
        self.redirect_with(location, 302)
    }

    pub fn redirect_with(&mut self, location: impl Into<String>, status: u16) -> Response {
        self.status = status;
        let headers = self.headers.clone();
        Response::redirect(location, status).with_headers(&headers)
    }

    /// A streamed response with status 200.
    pub fn stream(&mut self, stream: BoxStream<'static, io::Result<Bytes>>) -> Response {
        self.stream_with(stream, 200, &Headers::new())
    }

    pub fn stream_with(
        &mut self,
        stream: BoxStream<'static, io::Result<Bytes>>,
        status: u16,
        extra: &Headers,
    ) -> Response {
        self.assemble(status, "application/octet-stream", extra)
            .with_stream(stream)
    }
}
