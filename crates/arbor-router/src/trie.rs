//! One-node-per-segment backend.
//!
//! The simplest of the three matchers: every path segment owns a node,
//! children are tried static first, then dynamic, then wildcard, with
//! full backtracking. Middleware collection uses the descent trail, so
//! nodes carry no parent links.

use std::collections::HashMap;

use arbor_http::request::split_target;
use arbor_http::{ArborError, Method, Result};

use crate::matcher::{record_route, MatchedRoute, Matcher, RouteDescriptor, RouteHit};
use crate::middleware::{dedupe_first, MiddlewarePattern, MiddlewareStore};
use crate::pattern::{canonical, decode_segment, expand_optionals, normalize, parse_pattern, Segment};

struct TrieNode<T> {
    statics: HashMap<String, TrieNode<T>>,
    dynamics: Vec<(String, TrieNode<T>)>,
    wildcard: Option<(Option<String>, Box<TrieNode<T>>)>,
    data: HashMap<Method, Vec<T>>,
    middlewares: Vec<T>,
}

impl<T> TrieNode<T> {
    fn with_attachments(middlewares: Vec<T>) -> Self {
        Self {
            statics: HashMap::new(),
            dynamics: Vec::new(),
            wildcard: None,
            data: HashMap::new(),
            middlewares,
        }
    }

    fn data_for(&self, method: Method) -> Option<&Vec<T>> {
        self.data.get(&method).or_else(|| self.data.get(&Method::All))
    }
}

fn wildcard_token(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("*{}", name),
        None => "*".to_string(),
    }
}

fn wildcard_key(name: &Option<String>) -> String {
    name.clone().unwrap_or_else(|| "0".to_string())
}

/// Trie-backed route matcher.
pub struct TrieRouter<T> {
    root: TrieNode<T>,
    store: MiddlewareStore<T>,
    registered: Vec<RouteDescriptor>,
}

impl<T: Clone + PartialEq> TrieRouter<T> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::with_attachments(Vec::new()),
            store: MiddlewareStore::new(),
            registered: Vec::new(),
        }
    }

    fn insert_route(&mut self, method: Method, route: &str, data: Vec<T>) -> Result<()> {
        let segments = parse_pattern(route)?;
        let store = &self.store;
        let mut node = &mut self.root;
        let mut path_tokens: Vec<String> = Vec::new();

        for segment in &segments {
            path_tokens.push(segment.token());
            match segment {
                Segment::Static(literal) => {
                    node = node
                        .statics
                        .entry(literal.clone())
                        .or_insert_with(|| {
                            TrieNode::with_attachments(store.attachments_for(&path_tokens))
                        });
                }
                Segment::Dynamic(name) => {
                    let position = node.dynamics.iter().position(|(n, _)| n == name);
                    let index = match position {
                        Some(index) => index,
                        None => {
                            node.dynamics.push((
                                name.clone(),
                                TrieNode::with_attachments(store.attachments_for(&path_tokens)),
                            ));
                            node.dynamics.len() - 1
                        }
                    };
                    node = &mut node.dynamics[index].1;
                }
                Segment::Wildcard(name) => {
                    let slot = node.wildcard.get_or_insert_with(|| {
                        (
                            name.clone(),
                            Box::new(TrieNode::with_attachments(store.attachments_for(&path_tokens))),
                        )
                    });
                    // The latest registration names the binding.
                    slot.0 = name.clone();
                    node = slot.1.as_mut();
                }
            }
        }

        node.data.insert(method, data);
        record_route(&mut self.registered, method, route);
        Ok(())
    }

    /// Walks to the node at `tokens`, creating segments on the way.
    fn ensure_node(&mut self, tokens: &[String]) -> Result<&mut TrieNode<T>> {
        let store = &self.store;
        let mut node = &mut self.root;
        let mut path_tokens: Vec<String> = Vec::new();

        for token in tokens {
            path_tokens.push(token.clone());
            if let Some(name) = token.strip_prefix(':') {
                let name = name.to_string();
                let position = node.dynamics.iter().position(|(n, _)| *n == name);
                let index = match position {
                    Some(index) => index,
                    None => {
                        node.dynamics.push((
                            name,
                            TrieNode::with_attachments(store.attachments_for(&path_tokens)),
                        ));
                        node.dynamics.len() - 1
                    }
                };
                node = &mut node.dynamics[index].1;
            } else if token.starts_with('*') {
                return Err(ArborError::UnsupportedPath(canonical(tokens)));
            } else {
                node = node
                    .statics
                    .entry(token.clone())
                    .or_insert_with(|| {
                        TrieNode::with_attachments(store.attachments_for(&path_tokens))
                    });
            }
        }
        Ok(node)
    }
}

impl<T: Clone + PartialEq> Default for TrieRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn attach_recursive<T: Clone>(node: &mut TrieNode<T>, middlewares: &[T]) {
    node.middlewares.extend(middlewares.iter().cloned());
    for child in node.statics.values_mut() {
        attach_recursive(child, middlewares);
    }
    for (_, child) in node.dynamics.iter_mut() {
        attach_recursive(child, middlewares);
    }
    if let Some((_, child)) = node.wildcard.as_mut() {
        attach_recursive(child, middlewares);
    }
}

fn search<'a, T: Clone + PartialEq>(
    node: &'a TrieNode<T>,
    segments: &[String],
    index: usize,
    method: Method,
    trail: &mut Vec<&'a TrieNode<T>>,
    tokens: &mut Vec<String>,
    params: &mut Vec<(String, String)>,
) -> Option<&'a Vec<T>> {
    if index == segments.len() {
        if let Some(data) = node.data_for(method) {
            return Some(data);
        }
        // A tail wildcard also matches an empty remainder.
        if let Some((name, child)) = node.wildcard.as_ref() {
            if let Some(data) = child.data_for(method) {
                trail.push(child);
                tokens.push(wildcard_token(name));
                params.push((wildcard_key(name), String::new()));
                return Some(data);
            }
        }
        return None;
    }

    let segment = &segments[index];

    if let Some(child) = node.statics.get(segment) {
        trail.push(child);
        tokens.push(segment.clone());
        if let Some(data) = search(child, segments, index + 1, method, trail, tokens, params) {
            return Some(data);
        }
        trail.pop();
        tokens.pop();
    }

    for (name, child) in &node.dynamics {
        trail.push(child);
        tokens.push(format!(":{}", name));
        params.push((name.clone(), decode_segment(segment)));
        if let Some(data) = search(child, segments, index + 1, method, trail, tokens, params) {
            return Some(data);
        }
        params.pop();
        trail.pop();
        tokens.pop();
    }

    if let Some((name, child)) = node.wildcard.as_ref() {
        if let Some(data) = child.data_for(method) {
            let rest = segments[index..]
                .iter()
                .map(|s| decode_segment(s))
                .collect::<Vec<_>>()
                .join("/");
            trail.push(child);
            tokens.push(wildcard_token(name));
            params.push((wildcard_key(name), rest));
            return Some(data);
        }
    }

    None
}

impl<T: Clone + PartialEq + Send + Sync> Matcher<T> for TrieRouter<T> {
    fn add(&mut self, method: Method, path: &str, data: Vec<T>) -> Result<()> {
        for route in expand_optionals(path)? {
            self.insert_route(method, &route, data.clone())?;
        }
        Ok(())
    }

    fn lookup(&self, method: Method, url: &str) -> Option<MatchedRoute<T>> {
        let segments = normalize(split_target(url).path);
        let mut trail = vec![&self.root];
        let mut tokens = Vec::new();
        let mut params = Vec::new();

        let data = search(
            &self.root,
            &segments,
            0,
            method,
            &mut trail,
            &mut tokens,
            &mut params,
        )?;

        let middlewares = dedupe_first(
            trail
                .iter()
                .flat_map(|node| node.middlewares.iter().cloned())
                .collect(),
        );

        let hit = RouteHit {
            matched_path: canonical(&tokens),
            params: params.into_iter().collect(),
            data: data.clone(),
            middlewares,
        };
        Some(hit.into_matched(method, url))
    }

    fn routes(&self) -> Vec<RouteDescriptor> {
        self.registered.clone()
    }

    fn push_middlewares(&mut self, pattern: &str, middlewares: Vec<T>) -> Result<()> {
        let pattern = MiddlewarePattern::parse(pattern);
        match &pattern {
            MiddlewarePattern::Global => {
                attach_recursive(&mut self.root, &middlewares);
            }
            MiddlewarePattern::Subtree(prefix) => {
                let anchor = self.ensure_node(prefix)?;
                attach_recursive(anchor, &middlewares);
            }
            MiddlewarePattern::Exact(tokens) => {
                let node = self.ensure_node(tokens)?;
                node.middlewares.extend(middlewares.iter().cloned());
            }
        }
        self.store.push(pattern, middlewares)
    }
}
