//! HTTP method enum.
//!
//! The dispatch pipeline recognizes the nine request methods of the HTTP
//! specification plus `All`, a registration-only pseudo-method that matches
//! any request method.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ArborError;

/// An HTTP request method.
///
/// `Method::All` never appears on an incoming request; it exists so routes
/// can be registered for every method at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
    Connect,
    All,
}

impl Method {
    /// The nine concrete request methods, in a fixed order.
    pub const CONCRETE: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Options,
        Method::Head,
        Method::Trace,
        Method::Connect,
    ];

    /// Canonical upper-case token for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::All => "ALL",
        }
    }

    /// Whether a route registered under `self` serves a request with
    /// method `request`.
    pub fn accepts(&self, request: Method) -> bool {
        *self == Method::All || *self == request
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ArborError;

    /// Parses a method token case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "OPTIONS" => Ok(Method::Options),
            "HEAD" => Ok(Method::Head),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            "ALL" => Ok(Method::All),
            other => Err(ArborError::UnsupportedMethod(other.to_string())),
        }
    }
}
