//! Ordered header multimap.
//!
//! Response headers accumulate across the handler chain before the final
//! body is set, so the map preserves insertion order, allows repeated
//! names (`Set-Cookie`), and joins list-valued headers with commas the way
//! the field syntax of HTTP expects.

use std::fmt;

/// An ordered multimap of header name/value pairs.
///
/// Name comparison is case-insensitive; the original casing of the first
/// writer is preserved on output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value recorded for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Appends a value, keeping any existing entries for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Appends a list-valued header as a single comma-joined entry.
    pub fn append_joined(&mut self, name: impl Into<String>, values: &[&str]) {
        self.entries.push((name.into(), values.join(", ")));
    }

    /// Replaces every entry for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Removes every entry for `name`.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Appends every entry of `other`, preserving both orders.
    pub fn merge(&mut self, other: &Headers) {
        self.entries.extend(other.entries.iter().cloned());
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

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_append_keeps_duplicates_in_order() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        assert_eq!(headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_set_replaces_all_occurrences() {
        let mut headers = Headers::new();
        headers.append("X-Tag", "one");
        headers.append("X-Tag", "two");
        headers.set("x-tag", "three");
        assert_eq!(headers.get_all("X-Tag"), vec!["three"]);
    }

    #[test]
    fn test_append_joined_comma_joins() {
        let mut headers = Headers::new();
        headers.append_joined("Accept", &["text/html", "application/json"]);
        assert_eq!(headers.get("Accept"), Some("text/html, application/json"));
    }

    #[test]
    fn test_merge_preserves_both_orders() {
        let mut a = Headers::new();
        a.append("A", "1");
        let mut b = Headers::new();
        b.append("B", "2");
        a.merge(&b);
        let collected: Vec<_> = a.iter().collect();
        assert_eq!(collected, vec![("A", "1"), ("B", "2")]);
    }
}
