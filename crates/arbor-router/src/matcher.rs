//! The matching contract shared by the three backends.

use arbor_http::request::split_target;
use arbor_http::{Method, Result};

use crate::radix::RadixRouter;
use crate::regexp::RegexpRouter;
use crate::trie::TrieRouter;

/// Parameters captured while matching a path.
///
/// Keys are the declared parameter names; unnamed tail wildcards bind
/// under their positional index rendered as a string (`"0"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A route as recorded at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: Method,
    pub path: String,
}

/// The outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRoute<T> {
    pub method: Method,
    /// The raw lookup input, query string and fragment included.
    pub url_input: String,
    /// The registered pattern that matched, e.g. `/heroes/:name`.
    pub matched_path: String,
    pub params: Params,
    pub search_params: Vec<(String, String)>,
    pub hash: Option<String>,
    /// Handlers registered at the terminal, in registration order.
    pub data: Vec<T>,
    /// Middlewares gathered root-to-leaf, duplicates collapsed.
    pub middlewares: Vec<T>,
}

/// What a backend's tree search produces before URL bookkeeping.
#[derive(Debug)]
pub(crate) struct RouteHit<T> {
    pub matched_path: String,
    pub params: Params,
    pub data: Vec<T>,
    pub middlewares: Vec<T>,
}

impl<T> RouteHit<T> {
    pub(crate) fn into_matched(self, method: Method, url: &str) -> MatchedRoute<T> {
        let target = split_target(url);
        MatchedRoute {
            method,
            url_input: url.to_string(),
            matched_path: self.matched_path,
            params: self.params,
            search_params: parse_query(target.query),
            hash: target.hash.map(str::to_string),
            data: self.data,
            middlewares: self.middlewares,
        }
    }
}

/// Decodes a raw query string into ordered key/value pairs.
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// The contract every backend implements.
///
/// `lookup` takes the raw request target (path, optionally followed by a
/// query string and fragment) and returns the matched handlers together
/// with the captured parameters.
pub trait Matcher<T>: Send + Sync
where
    T: Clone + PartialEq,
{
    /// Registers `data` under `(method, path)`. A later registration for
    /// the same pair supersedes the earlier one.
    fn add(&mut self, method: Method, path: &str, data: Vec<T>) -> Result<()>;

    fn lookup(&self, method: Method, url: &str) -> Option<MatchedRoute<T>>;

    /// Every registered route, in registration order.
    fn routes(&self) -> Vec<RouteDescriptor>;

    /// Attaches middlewares to matching nodes: `*` everywhere, a pattern
    /// with a trailing `*` to the subtree under its prefix, anything else
    /// to the exact node (created if absent).
    fn push_middlewares(&mut self, pattern: &str, middlewares: Vec<T>) -> Result<()>;

    /// Freezes the route table. A no-op for backends that do not compile
    /// their tables.
    fn seal(&mut self) {}
}

/// Records `(method, path)` in a registration-ordered descriptor list,
/// superseding an existing entry for the same pair.
pub(crate) fn record_route(registered: &mut Vec<RouteDescriptor>, method: Method, path: &str) {
    if registered
        .iter()
        .any(|r| r.method == method && r.path == path)
    {
        tracing::warn!(method = %method, path, "duplicate route registration supersedes earlier handlers");
    } else {
        registered.push(RouteDescriptor {
            method,
            path: path.to_string(),
        });
    }
}

/// Backend selection for the server core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    Trie,
    Radix,
    #[default]
    Regexp,
}

impl Backend {
    pub fn build<T>(self) -> Box<dyn Matcher<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        match self {
            Backend::Trie => Box::new(TrieRouter::new()),
            Backend::Radix => Box::new(RadixRouter::new()),
            Backend::Regexp => Box::new(RegexpRouter::new()),
        }
    }
}
