//! Content-type driven request body decoding.
//!
//! The parser runs once per request and the result is cached in the
//! per-request context. A JSON body that fails to parse is not an error
//! in the chain sense; it produces a ready-made `400 Invalid JSON`
//! response the executor commits directly.

use std::collections::HashMap;

use bytes::Bytes;

use crate::response::Response;

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormPart {
    /// UTF-8 view of the part data, for plain text fields.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A decoded `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub parts: Vec<FormPart>,
}

impl FormData {
    /// The first non-file part with the given field name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|p| p.name == name && p.filename.is_none())
            .and_then(|p| p.text())
    }

    /// The first file part with the given field name.
    pub fn file(&self, name: &str) -> Option<&FormPart> {
        self.parts
            .iter()
            .find(|p| p.name == name && p.filename.is_some())
    }
}

/// The outcome of decoding a request body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    UrlEncoded(HashMap<String, String>),
    Multipart(FormData),
    None,
}

/// Decodes `body` according to the request `Content-Type`.
///
/// Unknown or missing content types decode to [`ParsedBody::None`]. The
/// `Err` branch is a complete response (currently only `400 Invalid
/// JSON`) ready to be committed.
///
/// # Example
///
/// ```
/// use arbor_http::body::{parse, ParsedBody};
/// use bytes::Bytes;
/// use serde_json::json;
///
/// let body = Bytes::from_static(br#"{"n": 7}"#);
/// let parsed = parse(Some("application/json"), &body).unwrap();
/// assert_eq!(parsed, ParsedBody::Json(json!({"n": 7})));
/// ```
pub fn parse(content_type: Option<&str>, body: &Bytes) -> Result<ParsedBody, Box<Response>> {
    let Some(content_type) = content_type else {
        return Ok(ParsedBody::None);
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/json" => match serde_json::from_slice(body) {
            Ok(value) => Ok(ParsedBody::Json(value)),
            Err(_) => Err(Box::new(Response::text(400, "Invalid JSON"))),
        },
        "application/x-www-form-urlencoded" => {
            let mut map = HashMap::new();
            for (key, value) in form_urlencoded::parse(body) {
                // First occurrence of a key wins.
                map.entry(key.into_owned()).or_insert_with(|| value.into_owned());
            }
            Ok(ParsedBody::UrlEncoded(map))
        }
        "multipart/form-data" => {
            let Some(boundary) = boundary_of(content_type) else {
                return Ok(ParsedBody::Multipart(FormData::default()));
            };
            Ok(ParsedBody::Multipart(parse_multipart(body, &boundary)))
        }
        _ => Ok(ParsedBody::None),
    }
}

fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        Some(value.trim().trim_matches('"').to_string())
    })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a multipart body on its boundary delimiter. Parts that do not
/// carry a `Content-Disposition` name are dropped rather than reported.
fn parse_multipart(body: &Bytes, boundary: &str) -> FormData {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut form = FormData::default();
    let mut rest: &[u8] = body;

    // Skip the preamble up to the first delimiter.
    let Some(start) = find_subsequence(rest, &delimiter) else {
        return form;
    };
    rest = &rest[start + delimiter.len()..];

    loop {
        // A closing delimiter is followed by "--".
        if rest.starts_with(b"--") {
            break;
        }
        rest = rest.strip_prefix(b"\r\n").unwrap_or(rest);

        let Some(end) = find_subsequence(rest, &delimiter) else {
            break;
        };
        let raw_part = &rest[..end];
        rest = &rest[end + delimiter.len()..];

        if let Some(part) = parse_part(raw_part) {
            form.parts.push(part);
        }
    }

    form
}

fn parse_part(raw: &[u8]) -> Option<FormPart> {
    let header_end = find_subsequence(raw, b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&raw[..header_end]).ok()?;
    let mut data = &raw[header_end + 4..];
    // The part body is terminated by the CRLF preceding the delimiter.
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    }

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let (header, value) = line.split_once(':')?;
        if header.trim().eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((key, raw_value)) = param.trim().split_once('=') else {
                    continue;
                };
                let unquoted = raw_value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "name" => name = Some(unquoted),
                    "filename" => filename = Some(unquoted),
                    _ => {}
                }
            }
        } else if header.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    Some(FormPart {
        name: name?,
        filename,
        content_type,
        data: Bytes::copy_from_slice(data),
    })
}
