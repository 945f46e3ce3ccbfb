//! Process-environment view.
//!
//! Captured once when the server is constructed and handed to every
//! request context. Richer configuration pipelines (dotenv files, secret
//! stores) are external collaborators that feed this same shape.

use std::collections::HashMap;
use std::sync::Arc;

/// An immutable snapshot of key/value configuration.
#[derive(Debug, Clone, Default)]
pub struct Env(Arc<HashMap<String, String>>);

impl Env {
    /// Snapshots the current process environment.
    pub fn capture() -> Self {
        Self(Arc::new(std::env::vars().collect()))
    }

    /// Builds a view from explicit pairs, mostly for tests and embedders.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(Arc::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
