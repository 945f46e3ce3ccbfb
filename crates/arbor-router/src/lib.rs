//! Arbor Route Matching
//!
//! This crate maps `(method, path)` pairs onto ordered handler lists. Three
//! backends implement the same [`Matcher`] contract:
//!
//! - [`TrieRouter`] - one node per path segment; the simplest backend with
//!   strict precedence semantics, best for small route tables
//! - [`RadixRouter`] - compacts runs of static segments into single nodes;
//!   identical semantics, faster on dense tables
//! - [`RegexpRouter`] - seals the route table into a static fast map plus
//!   one precompiled alternation regex; the recommended default
//!
//! # Path syntax
//!
//! Segments are `/`-separated: literals (`/users`), dynamic parameters
//! (`/:name`), an unnamed tail wildcard (`/*`), a named tail wildcard
//! (`/*path`) and optional dynamic suffixes (`/:x?`, expanded into two
//! routes at registration time). Matching precedence at every node is
//! static, then dynamic, then wildcard.
//!
//! # Example
//!
//! ```
//! use arbor_http::Method;
//! use arbor_router::{Backend, Matcher};
//!
//! let mut router = Backend::Regexp.build::<&'static str>();
//! router.add(Method::Get, "/heroes/:name", vec!["show"]).unwrap();
//!
//! let matched = router.lookup(Method::Get, "/heroes/spiderman?x=1").unwrap();
//! assert_eq!(matched.params.get("name"), Some("spiderman"));
//! assert_eq!(matched.data, vec!["show"]);
//! ```

pub mod matcher;
pub mod middleware;
pub mod pattern;
pub mod radix;
pub mod regexp;
pub mod trie;

pub use matcher::{Backend, MatchedRoute, Matcher, Params, RouteDescriptor};
pub use radix::RadixRouter;
pub use regexp::RegexpRouter;
pub use trie::TrieRouter;
