//! Strict RFC 6265 cookie codec.
//!
//! Serialization validates names, values, domains and paths against the
//! grammar instead of silently re-encoding; attributes are emitted in a
//! fixed order so output is deterministic. Parsing is lenient: malformed
//! segments are skipped and the first occurrence of a name wins.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CookieError {
    #[error("invalid cookie name: {0:?}")]
    InvalidName(String),

    #[error("invalid cookie value for {0:?}")]
    InvalidValue(String),

    #[error("invalid cookie domain: {0:?}")]
    InvalidDomain(String),

    #[error("invalid cookie path: {0:?}")]
    InvalidPath(String),

    #[error("invalid cookie option: {0}")]
    InvalidOption(String),
}

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = CookieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(CookieError::InvalidOption(format!("SameSite={}", other))),
        }
    }
}

/// The `Priority` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CookieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(CookieError::InvalidOption(format!("Priority={}", other))),
        }
    }
}

/// Attributes attached to a serialized cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub http_only: bool,
    pub partitioned: bool,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
    pub priority: Option<Priority>,
    pub secure: bool,
}

// cookie-name = token (RFC 2616 token characters)
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

// cookie-octet = %x21 / %x23-2B / %x2D-3A / %x3C-5B / %x5D-7E
fn is_cookie_octet(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x2B' | '\x2D'..='\x3A' | '\x3C'..='\x5B' | '\x5D'..='\x7E')
}

fn is_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

// path-value = any CHAR except CTLs and ";"
fn is_path_char(c: char) -> bool {
    let code = c as u32;
    (0x20..0x7F).contains(&code) && c != ';'
}

fn validate_name(name: &str) -> Result<(), CookieError> {
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(CookieError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_value(name: &str, value: &str) -> Result<(), CookieError> {
    // A value may be wrapped in a single pair of double quotes.
    let inner = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value);
    if inner.chars().all(is_cookie_octet) {
        Ok(())
    } else {
        Err(CookieError::InvalidValue(name.to_string()))
    }
}

/// Serializes one cookie into a `Set-Cookie` header value.
///
/// Attributes are emitted in the fixed order `Max-Age, Domain, Expires,
/// HttpOnly, Partitioned, Path, SameSite, Priority, Secure`. The name and
/// value are validated against the RFC 6265 grammar rather than encoded;
/// a value outside the cookie-octet set is the caller's error.
///
/// # Arguments
///
/// * `name` - Cookie name, a token per RFC 2616
/// * `value` - Cookie value, optionally wrapped in one pair of quotes
/// * `options` - Attributes to append
///
/// # Example
///
/// ```
/// use arbor_http::cookie::{serialize, CookieOptions, SameSite};
///
/// let options = CookieOptions {
///     http_only: true,
///     same_site: Some(SameSite::Lax),
///     ..Default::default()
/// };
/// let header = serialize("session", "abc123", &options).unwrap();
/// assert_eq!(header, "session=abc123; HttpOnly; SameSite=Lax");
/// ```
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> Result<String, CookieError> {
    validate_name(name)?;
    validate_value(name, value)?;

    let mut out = format!("{}={}", name, value);

    if let Some(max_age) = options.max_age {
        out.push_str(&format!("; Max-Age={}", max_age));
    }
    if let Some(domain) = &options.domain {
        if domain.is_empty() || !domain.chars().all(is_domain_char) {
            return Err(CookieError::InvalidDomain(domain.clone()));
        }
        out.push_str("; Domain=");
        out.push_str(domain);
    }
    if let Some(expires) = &options.expires {
        out.push_str("; Expires=");
        out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
    }
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.partitioned {
        out.push_str("; Partitioned");
    }
    if let Some(path) = &options.path {
        if path.is_empty() || !path.chars().all(is_path_char) {
            return Err(CookieError::InvalidPath(path.clone()));
        }
        out.push_str("; Path=");
        out.push_str(path);
    }
    if let Some(same_site) = options.same_site {
        out.push_str("; SameSite=");
        out.push_str(same_site.as_str());
    }
    if let Some(priority) = options.priority {
        out.push_str("; Priority=");
        out.push_str(priority.as_str());
    }
    if options.secure {
        out.push_str("; Secure");
    }

    Ok(out)
}

/// Parses a `Cookie` request header into name/value pairs.
///
/// Values are URL-decoded; use [`parse_raw`] to keep them verbatim.
/// Malformed segments are skipped and the first occurrence of each name
/// wins.
///
/// # Example
///
/// ```
/// use arbor_http::cookie::parse;
///
/// let pairs = parse("theme=dark; theme=light; lang=en");
/// assert_eq!(pairs, vec![
///     ("theme".to_string(), "dark".to_string()),
///     ("lang".to_string(), "en".to_string()),
/// ]);
/// ```
pub fn parse(header: &str) -> Vec<(String, String)> {
    parse_inner(header, true)
}

/// Like [`parse`], without URL-decoding the values.
pub fn parse_raw(header: &str) -> Vec<(String, String)> {
    parse_inner(header, false)
}

fn parse_inner(header: &str, decode: bool) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for segment in header.split(';') {
        let segment = segment.trim();
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if pairs.iter().any(|(existing, _)| existing == name) {
            continue;
        }

        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        let decoded = if decode {
            match percent_decode_str(value).decode_utf8() {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => continue,
            }
        } else {
            value.to_string()
        };

        pairs.push((name.to_string(), decoded));
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_serialize_bare_pair() {
        let out = serialize("session", "abc123", &CookieOptions::default()).unwrap();
        assert_eq!(out, "session=abc123");
    }

    #[test]
    fn test_serialize_attribute_order() {
        let options = CookieOptions {
            max_age: Some(3600),
            domain: Some("example.com".into()),
            expires: Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()),
            http_only: true,
            partitioned: true,
            path: Some("/".into()),
            same_site: Some(SameSite::Lax),
            priority: Some(Priority::High),
            secure: true,
        };
        let out = serialize("id", "v", &options).unwrap();
        assert_eq!(
            out,
            "id=v; Max-Age=3600; Domain=example.com; Expires=Fri, 02 Jan 2026 03:04:05 GMT; \
             HttpOnly; Partitioned; Path=/; SameSite=Lax; Priority=High; Secure"
        );
    }

    #[test]
    fn test_serialize_rejects_bad_name() {
        let err = serialize("bad name", "v", &CookieOptions::default()).unwrap_err();
        assert_eq!(err, CookieError::InvalidName("bad name".into()));
    }

    #[test]
    fn test_serialize_rejects_bad_value() {
        let err = serialize("n", "a;b", &CookieOptions::default()).unwrap_err();
        assert_eq!(err, CookieError::InvalidValue("n".into()));
    }

    #[test]
    fn test_serialize_accepts_quoted_value() {
        let out = serialize("n", "\"quoted\"", &CookieOptions::default()).unwrap();
        assert_eq!(out, "n=\"quoted\"");
    }

    #[test]
    fn test_serialize_rejects_bad_domain_and_path() {
        let options = CookieOptions {
            domain: Some("exa mple.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            serialize("n", "v", &options),
            Err(CookieError::InvalidDomain(_))
        ));

        let options = CookieOptions {
            path: Some("/a;b".into()),
            ..Default::default()
        };
        assert!(matches!(
            serialize("n", "v", &options),
            Err(CookieError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_same_site_and_priority_parsing() {
        assert_eq!("lax".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!(matches!(
            "sideways".parse::<SameSite>(),
            Err(CookieError::InvalidOption(_))
        ));
        assert!(matches!(
            "urgent".parse::<Priority>(),
            Err(CookieError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_parse_basic_pairs() {
        let pairs = parse("a=1; b=2");
        assert_eq!(pairs, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let pairs = parse("a=first; a=second");
        assert_eq!(pairs, vec![("a".to_string(), "first".to_string())]);
    }

    #[test]
    fn test_parse_strips_matching_quotes() {
        let pairs = parse("a=\"hello\"");
        assert_eq!(pairs[0].1, "hello");
    }

    #[test]
    fn test_parse_url_decodes_by_default() {
        let pairs = parse("a=hello%20world");
        assert_eq!(pairs[0].1, "hello world");
        let raw = parse_raw("a=hello%20world");
        assert_eq!(raw[0].1, "hello%20world");
    }

    #[test]
    fn test_parse_skips_malformed_segments() {
        let pairs = parse("just-a-flag; a=1; ; =2");
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_round_trip_canonical_pair() {
        let input = "token=abc123";
        let pairs = parse(input);
        let out = serialize(&pairs[0].0, &pairs[0].1, &CookieOptions::default()).unwrap();
        assert_eq!(out, input);
    }
}
