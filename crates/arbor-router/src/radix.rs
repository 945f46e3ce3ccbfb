//! Compacted-run backend.
//!
//! Semantically identical to the trie, but runs of consecutive static
//! segments share a single node. Inserting a path that diverges inside a
//! run splits the node at the divergence point, so route boundaries that
//! matter (dynamic siblings, middleware anchors) always fall on node
//! boundaries.

use std::collections::HashMap;

use arbor_http::request::split_target;
use arbor_http::{ArborError, Method, Result};

use crate::matcher::{record_route, MatchedRoute, Matcher, RouteDescriptor, RouteHit};
use crate::middleware::{dedupe_first, MiddlewarePattern, MiddlewareStore};
use crate::pattern::{canonical, decode_segment, expand_optionals, normalize, parse_pattern, Segment};

struct RadixNode<T> {
    /// Static tokens consumed on entering this node. Empty for the root
    /// and for dynamic/wildcard nodes.
    run: Vec<String>,
    statics: HashMap<String, RadixNode<T>>,
    dynamics: Vec<(String, RadixNode<T>)>,
    wildcard: Option<(Option<String>, Box<RadixNode<T>>)>,
    data: HashMap<Method, Vec<T>>,
    middlewares: Vec<T>,
}

impl<T> RadixNode<T> {
    fn with_attachments(run: Vec<String>, middlewares: Vec<T>) -> Self {
        Self {
            run,
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

/// Splits `node` after `at` run tokens. The tail of the run, along with
/// every child and all terminal data, moves into a new static child; the
/// shortened node keeps only the middlewares attached at its own depth.
fn split_node<T>(node: &mut RadixNode<T>, at: usize, inherited: Vec<T>) {
    let tail = node.run.split_off(at);
    let lower = RadixNode {
        run: tail,
        statics: std::mem::take(&mut node.statics),
        dynamics: std::mem::take(&mut node.dynamics),
        wildcard: node.wildcard.take(),
        data: std::mem::take(&mut node.data),
        middlewares: std::mem::replace(&mut node.middlewares, inherited),
    };
    let key = lower.run[0].clone();
    node.statics.insert(key, lower);
}

/// Descends from `node` along `segments`, creating and splitting nodes as
/// needed, and returns the terminal node.
fn insert_into<'a, T: Clone + PartialEq>(
    node: &'a mut RadixNode<T>,
    segments: &[Segment],
    path_tokens: &mut Vec<String>,
    store: &MiddlewareStore<T>,
) -> &'a mut RadixNode<T> {
    let Some(first) = segments.first() else {
        return node;
    };

    match first {
        Segment::Static(_) => {
            let run_len = segments
                .iter()
                .take_while(|s| matches!(s, Segment::Static(_)))
                .count();
            let run: Vec<String> = segments[..run_len].iter().map(Segment::token).collect();

            let fresh_path: Vec<String> = path_tokens
                .iter()
                .cloned()
                .chain(run.iter().cloned())
                .collect();
            let child = node
                .statics
                .entry(run[0].clone())
                .or_insert_with(|| {
                    RadixNode::with_attachments(run.clone(), store.attachments_for(&fresh_path))
                });

            let common = child
                .run
                .iter()
                .zip(run.iter())
                .take_while(|(a, b)| a == b)
                .count();
            if common < child.run.len() {
                let mut intermediate_path = path_tokens.clone();
                intermediate_path.extend(child.run[..common].iter().cloned());
                let inherited = store.attachments_for(&intermediate_path);
                split_node(child, common, inherited);
            }

            let consumed = child.run.len();
            path_tokens.extend(child.run.iter().cloned());
            insert_into(child, &segments[consumed..], path_tokens, store)
        }
        Segment::Dynamic(name) => {
            path_tokens.push(first.token());
            let position = node.dynamics.iter().position(|(n, _)| n == name);
            let index = match position {
                Some(index) => index,
                None => {
                    node.dynamics.push((
                        name.clone(),
                        RadixNode::with_attachments(Vec::new(), store.attachments_for(path_tokens)),
                    ));
                    node.dynamics.len() - 1
                }
            };
            insert_into(&mut node.dynamics[index].1, &segments[1..], path_tokens, store)
        }
        Segment::Wildcard(name) => {
            path_tokens.push(first.token());
            let slot = node.wildcard.get_or_insert_with(|| {
                (
                    name.clone(),
                    Box::new(RadixNode::with_attachments(
                        Vec::new(),
                        store.attachments_for(path_tokens),
                    )),
                )
            });
            slot.0 = name.clone();
            insert_into(slot.1.as_mut(), &segments[1..], path_tokens, store)
        }
    }
}

fn attach_recursive<T: Clone>(node: &mut RadixNode<T>, middlewares: &[T]) {
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
    node: &'a RadixNode<T>,
    segments: &[String],
    index: usize,
    method: Method,
    trail: &mut Vec<&'a RadixNode<T>>,
    tokens: &mut Vec<String>,
    params: &mut Vec<(String, String)>,
) -> Option<&'a Vec<T>> {
    if index == segments.len() {
        if let Some(data) = node.data_for(method) {
            return Some(data);
        }
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
        let remaining = &segments[index..];
        if child.run.len() <= remaining.len()
            && child.run.iter().zip(remaining.iter()).all(|(a, b)| a == b)
        {
            trail.push(child);
            tokens.extend(child.run.iter().cloned());
            if let Some(data) = search(
                child,
                segments,
                index + child.run.len(),
                method,
                trail,
                tokens,
                params,
            ) {
                return Some(data);
            }
            tokens.truncate(tokens.len() - child.run.len());
            trail.pop();
        }
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

/// Radix-backed route matcher.
pub struct RadixRouter<T> {
    root: RadixNode<T>,
    store: MiddlewareStore<T>,
    registered: Vec<RouteDescriptor>,
}

impl<T: Clone + PartialEq> RadixRouter<T> {
    pub fn new() -> Self {
        Self {
            root: RadixNode::with_attachments(Vec::new(), Vec::new()),
            store: MiddlewareStore::new(),
            registered: Vec::new(),
        }
    }

    fn ensure_path(&mut self, tokens: &[String]) -> Result<&mut RadixNode<T>> {
        let mut segments = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Some(name) = token.strip_prefix(':') {
                segments.push(Segment::Dynamic(name.to_string()));
            } else if token.starts_with('*') {
                return Err(ArborError::UnsupportedPath(canonical(tokens)));
            } else {
                segments.push(Segment::Static(token.clone()));
            }
        }
        let mut path_tokens = Vec::new();
        Ok(insert_into(&mut self.root, &segments, &mut path_tokens, &self.store))
    }
}

impl<T: Clone + PartialEq> Default for RadixRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + Send + Sync> Matcher<T> for RadixRouter<T> {
    fn add(&mut self, method: Method, path: &str, data: Vec<T>) -> Result<()> {
        for route in expand_optionals(path)? {
            let segments = parse_pattern(&route)?;
            let mut path_tokens = Vec::new();
            let terminal = insert_into(&mut self.root, &segments, &mut path_tokens, &self.store);
            terminal.data.insert(method, data.clone());
            record_route(&mut self.registered, method, &route);
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
                let anchor = self.ensure_path(prefix)?;
                attach_recursive(anchor, &middlewares);
            }
            MiddlewarePattern::Exact(tokens) => {
                let node = self.ensure_path(tokens)?;
                node.middlewares.extend(middlewares.iter().cloned());
            }
        }
        self.store.push(pattern, middlewares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> RadixRouter<&'static str> {
        RadixRouter::new()
    }

    #[test]
    fn test_compacted_static_route() {
        let mut r = router();
        r.add(Method::Get, "/api/v1/users", vec!["list"]).unwrap();
        let hit = r.lookup(Method::Get, "/api/v1/users").unwrap();
        assert_eq!(hit.data, vec!["list"]);
        assert_eq!(hit.matched_path, "/api/v1/users");
    }

    #[test]
    fn test_split_on_divergence() {
        let mut r = router();
        r.add(Method::Get, "/api/v1/users", vec!["users"]).unwrap();
        r.add(Method::Get, "/api/v1/orders", vec!["orders"]).unwrap();
        r.add(Method::Get, "/api/v2", vec!["v2"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/api/v1/users").unwrap().data, vec!["users"]);
        assert_eq!(r.lookup(Method::Get, "/api/v1/orders").unwrap().data, vec!["orders"]);
        assert_eq!(r.lookup(Method::Get, "/api/v2").unwrap().data, vec!["v2"]);
        assert!(r.lookup(Method::Get, "/api/v1").is_none());
    }

    #[test]
    fn test_terminal_inside_existing_run() {
        let mut r = router();
        r.add(Method::Get, "/a/b/c", vec!["deep"]).unwrap();
        r.add(Method::Get, "/a/b", vec!["mid"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/a/b").unwrap().data, vec!["mid"]);
        assert_eq!(r.lookup(Method::Get, "/a/b/c").unwrap().data, vec!["deep"]);
    }

    #[test]
    fn test_dynamic_after_shared_prefix() {
        let mut r = router();
        r.add(Method::Get, "/users/me", vec!["me"]).unwrap();
        r.add(Method::Get, "/users/:id", vec!["by_id"]).unwrap();
        let hit = r.lookup(Method::Get, "/users/me").unwrap();
        assert_eq!(hit.data, vec!["me"]);
        assert!(hit.params.is_empty());
        let hit = r.lookup(Method::Get, "/users/42").unwrap();
        assert_eq!(hit.params.get("id"), Some("42"));
    }

    #[test]
    fn test_backtracks_within_runs() {
        let mut r = router();
        r.add(Method::Get, "/a/b/c", vec!["static"]).unwrap();
        r.add(Method::Get, "/a/:x/d", vec!["dynamic"]).unwrap();
        let hit = r.lookup(Method::Get, "/a/b/d").unwrap();
        assert_eq!(hit.data, vec!["dynamic"]);
        assert_eq!(hit.params.get("x"), Some("b"));
    }

    #[test]
    fn test_wildcard_tail() {
        let mut r = router();
        r.add(Method::Get, "/assets/*path", vec!["serve"]).unwrap();
        let hit = r.lookup(Method::Get, "/assets/images/logo.png").unwrap();
        assert_eq!(hit.params.get("path"), Some("images/logo.png"));
        assert_eq!(hit.matched_path, "/assets/*path");
    }

    #[test]
    fn test_middleware_anchor_splits_run() {
        let mut r = router();
        r.add(Method::Get, "/api/v1/users", vec!["h"]).unwrap();
        r.push_middlewares("/api/*", vec!["m"]).unwrap();
        let hit = r.lookup(Method::Get, "/api/v1/users").unwrap();
        assert_eq!(hit.middlewares, vec!["m"]);
    }

    #[test]
    fn test_middleware_order_and_dedup() {
        let mut r = router();
        r.push_middlewares("/", vec!["m1"]).unwrap();
        r.push_middlewares("/api/*", vec!["m2", "m1"]).unwrap();
        r.add(Method::Get, "/api/x", vec!["h"]).unwrap();
        let hit = r.lookup(Method::Get, "/api/x").unwrap();
        assert_eq!(hit.middlewares, vec!["m1", "m2"]);
    }

    #[test]
    fn test_optional_expansion() {
        let mut r = router();
        r.add(Method::Get, "/files/:name?", vec!["files"]).unwrap();
        assert!(r.lookup(Method::Get, "/files").is_some());
        assert_eq!(
            r.lookup(Method::Get, "/files/a.txt").unwrap().params.get("name"),
            Some("a.txt")
        );
    }

    #[test]
    fn test_reregistration_supersedes() {
        let mut r = router();
        r.add(Method::Get, "/a/b", vec!["one"]).unwrap();
        r.add(Method::Get, "/a/b", vec!["two"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/a/b").unwrap().data, vec!["two"]);
        assert_eq!(r.routes().len(), 1);
    }

    #[test]
    fn test_root_and_trailing_slash() {
        let mut r = router();
        r.add(Method::Get, "/", vec!["root"]).unwrap();
        r.add(Method::Get, "/a", vec!["a"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/").unwrap().data, vec!["root"]);
        assert_eq!(r.lookup(Method::Get, "/a/").unwrap().data, vec!["a"]);
    }
}
