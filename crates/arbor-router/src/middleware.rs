//! Middleware attachment patterns and collection.
//!
//! Middlewares attach to matcher nodes through three pattern shapes:
//! `*` (every node, current and future), `prefix/*` (the subtree rooted
//! at the prefix) and an exact path (the node itself, created if absent).
//! Backends retain the parsed patterns so nodes created later pick up the
//! attachments they qualify for.

use arbor_http::Result;

use crate::pattern::normalize;

/// A parsed `push_middlewares` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewarePattern {
    Global,
    Subtree(Vec<String>),
    Exact(Vec<String>),
}

impl MiddlewarePattern {
    pub fn parse(pattern: &str) -> Self {
        let mut tokens = normalize(pattern);
        match tokens.last().map(String::as_str) {
            Some("*") if tokens.len() == 1 => MiddlewarePattern::Global,
            Some("*") => {
                tokens.pop();
                MiddlewarePattern::Subtree(tokens)
            }
            _ => MiddlewarePattern::Exact(tokens),
        }
    }

    /// Whether a node at `path` (as pattern tokens) carries this
    /// attachment, and at which depth it anchors for ordering.
    pub fn anchor_depth(&self, path: &[String]) -> Option<usize> {
        match self {
            MiddlewarePattern::Global => Some(0),
            MiddlewarePattern::Subtree(prefix) => {
                (path.len() >= prefix.len() && path[..prefix.len()] == prefix[..])
                    .then_some(prefix.len())
            }
            // Collection walks every node on the matched path, so an
            // exact attachment applies to the node and everything below.
            MiddlewarePattern::Exact(tokens) => {
                (path.len() >= tokens.len() && path[..tokens.len()] == tokens[..])
                    .then_some(tokens.len())
            }
        }
    }

    /// Whether the node at `path` is itself an attachment point.
    pub fn attaches_to(&self, path: &[String]) -> bool {
        match self {
            MiddlewarePattern::Global => true,
            MiddlewarePattern::Subtree(prefix) => {
                path.len() >= prefix.len() && path[..prefix.len()] == prefix[..]
            }
            MiddlewarePattern::Exact(tokens) => path == tokens,
        }
    }
}

/// The retained pattern list of one matcher.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareStore<T> {
    entries: Vec<(MiddlewarePattern, Vec<T>)>,
}

impl<T: Clone + PartialEq> MiddlewareStore<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, pattern: MiddlewarePattern, middlewares: Vec<T>) -> Result<()> {
        self.entries.push((pattern, middlewares));
        Ok(())
    }

    /// Middlewares a newly created node at `path` starts with.
    pub fn attachments_for(&self, path: &[String]) -> Vec<T> {
        let mut out = Vec::new();
        for (pattern, middlewares) in &self.entries {
            if pattern.attaches_to(path) {
                out.extend(middlewares.iter().cloned());
            }
        }
        out
    }

    /// The full middleware chain for a route at `path`, ordered shallow
    /// to deep with first-occurrence deduplication.
    pub fn collect_for(&self, path: &[String]) -> Vec<T> {
        let mut anchored: Vec<(usize, usize, &Vec<T>)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, (pattern, middlewares))| {
                pattern
                    .anchor_depth(path)
                    .map(|depth| (depth, index, middlewares))
            })
            .collect();
        anchored.sort_by_key(|(depth, index, _)| (*depth, *index));

        dedupe_first(
            anchored
                .into_iter()
                .flat_map(|(_, _, middlewares)| middlewares.iter().cloned())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collapses duplicates, keeping the first occurrence of each value.
pub fn dedupe_first<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
