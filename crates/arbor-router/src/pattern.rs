//! Path normalization and segment syntax.

use arbor_http::{ArborError, Result};
use percent_encoding::percent_decode_str;

/// One parsed segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Dynamic(String),
    /// Tail wildcard; `None` for the unnamed form.
    Wildcard(Option<String>),
}

impl Segment {
    /// The pattern token this segment was parsed from.
    pub fn token(&self) -> String {
        match self {
            Segment::Static(literal) => literal.clone(),
            Segment::Dynamic(name) => format!(":{}", name),
            Segment::Wildcard(None) => "*".to_string(),
            Segment::Wildcard(Some(name)) => format!("*{}", name),
        }
    }
}

/// Splits a path into segments, trimming one leading and one trailing
/// slash. `/` maps to the empty segment list.
pub fn normalize(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').map(str::to_string).collect()
    }
}

/// Reassembles segments into a canonical path string.
pub fn canonical(tokens: &[String]) -> String {
    if tokens.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", tokens.join("/"))
    }
}

/// URL-decodes one matched segment; undecodable input binds verbatim.
pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Parses a registration path into segments.
///
/// Wildcards are only valid as the final segment; optional markers must
/// have been expanded by [`expand_optionals`] beforehand.
pub fn parse_pattern(path: &str) -> Result<Vec<Segment>> {
    let tokens = normalize(path);
    let mut segments = Vec::with_capacity(tokens.len());

    for (index, token) in tokens.iter().enumerate() {
        let segment = if let Some(name) = token.strip_prefix(':') {
            if name.is_empty() || name.ends_with('?') {
                return Err(ArborError::UnsupportedPath(path.to_string()));
            }
            Segment::Dynamic(name.to_string())
        } else if token == "*" {
            Segment::Wildcard(None)
        } else if let Some(name) = token.strip_prefix('*') {
            Segment::Wildcard(Some(name.to_string()))
        } else {
            Segment::Static(token.clone())
        };

        if matches!(segment, Segment::Wildcard(_)) && index + 1 != tokens.len() {
            return Err(ArborError::WildcardMisplacement(path.to_string()));
        }
        segments.push(segment);
    }

    Ok(segments)
}

/// Expands trailing optional parameters into concrete routes.
///
/// `/posts/:id?` becomes `/posts` and `/posts/:id`; a chain of optionals
/// expands one route per prefix. Optional markers anywhere but in a
/// contiguous dynamic tail are unsupported.
pub fn expand_optionals(path: &str) -> Result<Vec<String>> {
    let tokens = normalize(path);
    let is_optional = |token: &String| token.starts_with(':') && token.ends_with('?');

    let Some(first) = tokens.iter().position(is_optional) else {
        return Ok(vec![canonical(&tokens)]);
    };
    if !tokens[first..].iter().all(is_optional) {
        return Err(ArborError::UnsupportedPath(path.to_string()));
    }

    let mut expanded = Vec::with_capacity(tokens.len() - first + 1);
    for end in first..=tokens.len() {
        let mut route: Vec<String> = tokens[..first].to_vec();
        route.extend(
            tokens[first..end]
                .iter()
                .map(|token| token.trim_end_matches('?').to_string()),
        );
        expanded.push(canonical(&route));
    }
    Ok(expanded)
}
