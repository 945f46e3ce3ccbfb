//! Sealed precompiled-regexp backend.
//!
//! On the first lookup (or an explicit `seal`) the route table is frozen
//! and compiled, per method, into a direct map for purely static paths
//! plus one alternation regex for parameterized paths. Each alternative
//! of the regex carries a zero-width marker group; the marker that
//! participates in a match identifies the route, and per-route maps from
//! parameter names to capture-group indexes recover the bindings.
//!
//! Further `add` or `push_middlewares` calls fail with `MatcherSealed`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use arbor_http::request::split_target;
use arbor_http::{ArborError, Method, Result};
use regex::{escape, Regex};

use crate::matcher::{record_route, MatchedRoute, Matcher, Params, RouteDescriptor, RouteHit};
use crate::middleware::{MiddlewarePattern, MiddlewareStore};
use crate::pattern::{canonical, decode_segment, expand_optionals, normalize, parse_pattern, Segment};

struct RegisteredRoute<T> {
    method: Method,
    path: String,
    segments: Vec<Segment>,
    data: Vec<T>,
}

struct CompiledRoute<T> {
    pattern: String,
    data: Vec<T>,
    middlewares: Vec<T>,
    /// Parameter name to capture-group index, in declaration order.
    params: Vec<(String, usize)>,
}

struct MethodTable<T> {
    statics: HashMap<String, CompiledRoute<T>>,
    regex: Option<Regex>,
    entries: Vec<CompiledRoute<T>>,
    /// Marker group number per entry, parallel to `entries`.
    markers: Vec<usize>,
}

struct SealedTables<T> {
    tables: HashMap<Method, MethodTable<T>>,
}

/// The prefix tree the alternation is compiled from.
#[derive(Default)]
struct PatternNode {
    statics: Vec<(String, PatternNode)>,
    /// Dynamic children merge into one `[^/]+` branch; the per-route
    /// param maps keep the differing names apart.
    dynamic: Option<Box<PatternNode>>,
    wildcards: Vec<usize>,
    terminals: Vec<usize>,
}

fn tree_insert(node: &mut PatternNode, segments: &[Segment], route: usize) {
    let Some(first) = segments.first() else {
        node.terminals.push(route);
        return;
    };
    match first {
        Segment::Static(token) => {
            let position = node.statics.iter().position(|(t, _)| t == token);
            let index = match position {
                Some(index) => index,
                None => {
                    node.statics.push((token.clone(), PatternNode::default()));
                    node.statics.len() - 1
                }
            };
            tree_insert(&mut node.statics[index].1, &segments[1..], route);
        }
        Segment::Dynamic(_) => {
            let child = node.dynamic.get_or_insert_with(Box::default);
            tree_insert(child, &segments[1..], route);
        }
        Segment::Wildcard(_) => {
            node.wildcards.push(route);
        }
    }
}

#[derive(Clone)]
struct Emitted {
    marker: usize,
    positional: Vec<usize>,
    wildcard: Option<usize>,
}

/// Emits the alternation for `node`, assigning capture-group numbers in
/// source order. Alternatives are ordered terminal, static, dynamic,
/// wildcard so the leftmost-first preference of the regex engine encodes
/// the matching precedence.
fn tree_emit(
    node: &PatternNode,
    out: &mut String,
    group: &mut usize,
    param_stack: &mut Vec<usize>,
    emitted: &mut [Option<Emitted>],
) {
    let mut alternatives: Vec<String> = Vec::new();

    for terminal in &node.terminals {
        *group += 1;
        emitted[*terminal] = Some(Emitted {
            marker: *group,
            positional: param_stack.clone(),
            wildcard: None,
        });
        alternatives.push("()".to_string());
    }

    for (token, child) in &node.statics {
        let mut buf = format!("/{}", escape(token));
        tree_emit(child, &mut buf, group, param_stack, emitted);
        alternatives.push(buf);
    }

    if let Some(child) = &node.dynamic {
        *group += 1;
        param_stack.push(*group);
        let mut buf = "/([^/]+)".to_string();
        tree_emit(child, &mut buf, group, param_stack, emitted);
        param_stack.pop();
        alternatives.push(buf);
    }

    for wildcard in &node.wildcards {
        *group += 1;
        let rest = *group;
        *group += 1;
        emitted[*wildcard] = Some(Emitted {
            marker: *group,
            positional: param_stack.clone(),
            wildcard: Some(rest),
        });
        alternatives.push("(?:|/(.*))()".to_string());
    }

    if alternatives.is_empty() {
        return;
    }
    out.push_str("(?:");
    out.push_str(&alternatives.join("|"));
    out.push(')');
}

fn wildcard_key(name: &Option<String>) -> String {
    name.clone().unwrap_or_else(|| "0".to_string())
}

fn param_names(segments: &[Segment]) -> (Vec<String>, Option<String>) {
    let mut positional = Vec::new();
    let mut wildcard = None;
    for segment in segments {
        match segment {
            Segment::Dynamic(name) => positional.push(name.clone()),
            Segment::Wildcard(name) => wildcard = Some(wildcard_key(name)),
            Segment::Static(_) => {}
        }
    }
    (positional, wildcard)
}

/// Regexp-backed route matcher. The recommended default backend.
pub struct RegexpRouter<T> {
    routes: Vec<RegisteredRoute<T>>,
    store: MiddlewareStore<T>,
    registered: Vec<RouteDescriptor>,
    sealed: OnceLock<SealedTables<T>>,
}

impl<T: Clone + PartialEq + Send + Sync> RegexpRouter<T> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            store: MiddlewareStore::new(),
            registered: Vec::new(),
            sealed: OnceLock::new(),
        }
    }

    /// Whether the table has been compiled.
    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    fn build(&self) -> SealedTables<T> {
        let mut methods: HashSet<Method> = HashSet::new();
        for route in &self.routes {
            if route.method == Method::All {
                methods.extend(Method::CONCRETE);
            } else {
                methods.insert(route.method);
            }
        }

        let tables = methods
            .into_iter()
            .map(|method| (method, self.build_table(method)))
            .collect();
        SealedTables { tables }
    }

    fn build_table(&self, method: Method) -> MethodTable<T> {
        // One route per path, in first-registration order. An exact-method
        // registration shadows an `ALL` one for the same path regardless
        // of their relative order.
        let mut chosen: Vec<(&RegisteredRoute<T>, bool)> = Vec::new();
        for route in self.routes.iter().filter(|r| r.method.accepts(method)) {
            let exact = route.method == method;
            match chosen.iter().position(|(c, _)| c.path == route.path) {
                Some(index) => {
                    let (_, existing_exact) = chosen[index];
                    if exact || !existing_exact {
                        chosen[index] = (route, exact || existing_exact);
                    }
                }
                None => chosen.push((route, exact)),
            }
        }

        let mut statics = HashMap::new();
        let mut param_routes: Vec<&RegisteredRoute<T>> = Vec::new();

        for (route, _) in chosen {
            let tokens: Vec<String> = route.segments.iter().map(Segment::token).collect();
            let middlewares = self.store.collect_for(&tokens);
            if route.segments.iter().all(|s| matches!(s, Segment::Static(_))) {
                statics.insert(
                    route.path.clone(),
                    CompiledRoute {
                        pattern: route.path.clone(),
                        data: route.data.clone(),
                        middlewares,
                        params: Vec::new(),
                    },
                );
            } else {
                param_routes.push(route);
            }
        }

        if param_routes.is_empty() {
            return MethodTable {
                statics,
                regex: None,
                entries: Vec::new(),
                markers: Vec::new(),
            };
        }

        let mut tree = PatternNode::default();
        for (index, route) in param_routes.iter().enumerate() {
            tree_insert(&mut tree, &route.segments, index);
        }

        let mut source = String::from("^");
        let mut group = 0usize;
        let mut param_stack = Vec::new();
        let mut emitted: Vec<Option<Emitted>> = vec![None; param_routes.len()];
        tree_emit(&tree, &mut source, &mut group, &mut param_stack, &mut emitted);
        source.push('$');

        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(error) => {
                tracing::error!(%error, pattern = %source, "failed to compile route alternation");
                None
            }
        };

        let mut entries = Vec::new();
        let mut markers = Vec::new();
        for (route, slots) in param_routes.iter().zip(emitted) {
            let Some(slots) = slots else { continue };
            let tokens: Vec<String> = route.segments.iter().map(Segment::token).collect();
            let (positional_names, wildcard_name) = param_names(&route.segments);
            let mut params: Vec<(String, usize)> = positional_names
                .into_iter()
                .zip(slots.positional.iter().copied())
                .collect();
            if let (Some(name), Some(group)) = (wildcard_name, slots.wildcard) {
                params.push((name, group));
            }
            entries.push(CompiledRoute {
                pattern: route.path.clone(),
                data: route.data.clone(),
                middlewares: self.store.collect_for(&tokens),
                params,
            });
            markers.push(slots.marker);
        }

        MethodTable {
            statics,
            regex,
            entries,
            markers,
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync> Default for RegexpRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + Send + Sync> Matcher<T> for RegexpRouter<T> {
    fn add(&mut self, method: Method, path: &str, data: Vec<T>) -> Result<()> {
        if self.is_sealed() {
            return Err(ArborError::MatcherSealed);
        }
        for route in expand_optionals(path)? {
            let segments = parse_pattern(&route)?;
            match self
                .routes
                .iter_mut()
                .find(|r| r.method == method && r.path == route)
            {
                Some(existing) => existing.data = data.clone(),
                None => self.routes.push(RegisteredRoute {
                    method,
                    path: route.clone(),
                    segments,
                    data: data.clone(),
                }),
            }
            record_route(&mut self.registered, method, &route);
        }
        Ok(())
    }

    fn lookup(&self, method: Method, url: &str) -> Option<MatchedRoute<T>> {
        let sealed = self.sealed.get_or_init(|| self.build());
        let table = sealed.tables.get(&method)?;

        let segments = normalize(split_target(url).path);
        let path = canonical(&segments);

        if let Some(compiled) = table.statics.get(&path) {
            let hit = RouteHit {
                matched_path: compiled.pattern.clone(),
                params: Params::new(),
                data: compiled.data.clone(),
                middlewares: compiled.middlewares.clone(),
            };
            return Some(hit.into_matched(method, url));
        }

        let regex = table.regex.as_ref()?;
        let captures = regex.captures(&path)?;
        let entry_index = table
            .markers
            .iter()
            .position(|marker| captures.get(*marker).is_some())?;
        let compiled = &table.entries[entry_index];

        let mut params = Params::new();
        for (name, group) in &compiled.params {
            let value = captures
                .get(*group)
                .map(|capture| decode_segment(capture.as_str()))
                .unwrap_or_default();
            params.insert(name.clone(), value);
        }

        let hit = RouteHit {
            matched_path: compiled.pattern.clone(),
            params,
            data: compiled.data.clone(),
            middlewares: compiled.middlewares.clone(),
        };
        Some(hit.into_matched(method, url))
    }

    fn routes(&self) -> Vec<RouteDescriptor> {
        self.registered.clone()
    }

    fn push_middlewares(&mut self, pattern: &str, middlewares: Vec<T>) -> Result<()> {
        if self.is_sealed() {
            return Err(ArborError::MatcherSealed);
        }
        self.store.push(MiddlewarePattern::parse(pattern), middlewares)
    }

    fn seal(&mut self) {
        let _ = self.sealed.get_or_init(|| self.build());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> RegexpRouter<&'static str> {
        RegexpRouter::new()
    }

    #[test]
    fn test_static_fast_path() {
        let mut r = router();
        r.add(Method::Get, "/users/me", vec!["me"]).unwrap();
        let hit = r.lookup(Method::Get, "/users/me").unwrap();
        assert_eq!(hit.data, vec!["me"]);
        assert!(hit.params.is_empty());
    }

    #[test]
    fn test_dynamic_params() {
        let mut r = router();
        r.add(Method::Get, "/heroes/:name/:action", vec!["act"]).unwrap();
        let hit = r
            .lookup(Method::Get, "/heroes/spiderman/save?x=1#top")
            .unwrap();
        assert_eq!(hit.params.get("name"), Some("spiderman"));
        assert_eq!(hit.params.get("action"), Some("save"));
        assert_eq!(hit.search_params, vec![("x".to_string(), "1".to_string())]);
        assert_eq!(hit.hash.as_deref(), Some("top"));
    }

    #[test]
    fn test_static_beats_dynamic() {
        let mut r = router();
        r.add(Method::Get, "/users/:id", vec!["by_id"]).unwrap();
        r.add(Method::Get, "/users/me", vec!["me"]).unwrap();
        let hit = r.lookup(Method::Get, "/users/me").unwrap();
        assert_eq!(hit.data, vec!["me"]);
        assert!(hit.params.is_empty());
    }

    #[test]
    fn test_shared_prefix_alternation() {
        let mut r = router();
        r.add(Method::Get, "/users/:id/books", vec!["books"]).unwrap();
        r.add(Method::Get, "/users/:id/films", vec!["films"]).unwrap();
        let hit = r.lookup(Method::Get, "/users/7/films").unwrap();
        assert_eq!(hit.data, vec!["films"]);
        assert_eq!(hit.params.get("id"), Some("7"));
    }

    #[test]
    fn test_wildcard_tail() {
        let mut r = router();
        r.add(Method::Get, "/assets/*path", vec!["serve"]).unwrap();
        let hit = r.lookup(Method::Get, "/assets/images/logo.png").unwrap();
        assert_eq!(hit.params.get("path"), Some("images/logo.png"));
        let hit = r.lookup(Method::Get, "/assets").unwrap();
        assert_eq!(hit.params.get("path"), Some(""));
    }

    #[test]
    fn test_unnamed_wildcard() {
        let mut r = router();
        r.add(Method::Get, "/files/*", vec!["serve"]).unwrap();
        let hit = r.lookup(Method::Get, "/files/a/b").unwrap();
        assert_eq!(hit.params.get("0"), Some("a/b"));
    }

    #[test]
    fn test_optional_expansion_registers_both() {
        let mut r = router();
        r.add(Method::Get, "/posts/:id?", vec!["posts"]).unwrap();
        assert!(r.lookup(Method::Get, "/posts").is_some());
        assert_eq!(
            r.lookup(Method::Get, "/posts/9").unwrap().params.get("id"),
            Some("9")
        );
    }

    #[test]
    fn test_sealed_after_first_lookup() {
        let mut r = router();
        r.add(Method::Get, "/a", vec!["a"]).unwrap();
        assert!(!r.is_sealed());
        assert!(r.lookup(Method::Get, "/a").is_some());
        assert!(r.is_sealed());
        assert!(matches!(
            r.add(Method::Get, "/b", vec!["b"]),
            Err(ArborError::MatcherSealed)
        ));
        assert!(matches!(
            r.push_middlewares("*", vec!["m"]),
            Err(ArborError::MatcherSealed)
        ));
        // Lookups keep working after sealing.
        assert!(r.lookup(Method::Get, "/a").is_some());
    }

    #[test]
    fn test_explicit_seal() {
        let mut r = router();
        r.add(Method::Get, "/a", vec!["a"]).unwrap();
        r.seal();
        assert!(r.is_sealed());
        assert!(r.lookup(Method::Get, "/a").is_some());
    }

    #[test]
    fn test_all_method_routes() {
        let mut r = router();
        r.add(Method::All, "/ping", vec!["pong"]).unwrap();
        assert!(r.lookup(Method::Get, "/ping").is_some());
        assert!(r.lookup(Method::Delete, "/ping").is_some());
    }

    #[test]
    fn test_exact_method_shadows_all() {
        let mut r = router();
        r.add(Method::Get, "/x", vec!["get"]).unwrap();
        r.add(Method::All, "/x", vec!["any"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/x").unwrap().data, vec!["get"]);
        assert_eq!(r.lookup(Method::Post, "/x").unwrap().data, vec!["any"]);
    }

    #[test]
    fn test_middlewares_collected_for_param_routes() {
        let mut r = router();
        r.push_middlewares("/", vec!["m1"]).unwrap();
        r.push_middlewares("/api/*", vec!["m2"]).unwrap();
        r.add(Method::Get, "/api/:version", vec!["h"]).unwrap();
        let hit = r.lookup(Method::Get, "/api/v2").unwrap();
        assert_eq!(hit.middlewares, vec!["m1", "m2"]);
    }

    #[test]
    fn test_params_are_url_decoded() {
        let mut r = router();
        r.add(Method::Get, "/h/:name", vec!["h"]).unwrap();
        let hit = r.lookup(Method::Get, "/h/spider%20man").unwrap();
        assert_eq!(hit.params.get("name"), Some("spider man"));
    }

    #[test]
    fn test_regex_metacharacters_in_static_segments() {
        let mut r = router();
        r.add(Method::Get, "/files/v1.2/:name", vec!["h"]).unwrap();
        assert!(r.lookup(Method::Get, "/files/v1x2/zzz").is_none());
        assert!(r.lookup(Method::Get, "/files/v1.2/zzz").is_some());
    }

    #[test]
    fn test_root_wildcard() {
        let mut r = router();
        r.add(Method::Get, "/*rest", vec!["catch"]).unwrap();
        assert_eq!(r.lookup(Method::Get, "/").unwrap().params.get("rest"), Some(""));
        assert_eq!(
            r.lookup(Method::Get, "/a/b").unwrap().params.get("rest"),
            Some("a/b")
        );
    }
}
