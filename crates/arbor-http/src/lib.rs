//! Arbor HTTP Types
//!
//! This crate provides the transport-neutral HTTP vocabulary shared by all
//! arbor components. The framework core never talks to a socket directly;
//! a transport adapter translates an OS-level server's requests into these
//! types and writes the returned [`Response`] back to the wire.
//!
//! # Components
//!
//! - [`method`] - HTTP method enum, including the `ALL` pseudo-method
//! - [`status`] - the standard status-text table
//! - [`request`] / [`response`] - the request/response shapes consumed and
//!   produced by the dispatch pipeline
//! - [`headers`] - an ordered, append-friendly header multimap
//! - [`cookie`] - strict RFC 6265 serialization and parsing
//! - [`body`] - content-type driven request body decoding
//! - [`error`] - the shared error enum plus the `HttpException` and
//!   `Redirect` sentinels recovered by the chain executor
//!
//! # Example
//!
//! ```
//! use arbor_http::{Method, Request, Response};
//!
//! let request = Request::new(Method::Get, "/users/42?expand=1")
//!     .with_header("Accept", "application/json");
//! assert_eq!(request.target().path, "/users/42");
//!
//! let response = Response::text(200, "hello");
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.status_text(), "OK");
//! ```

pub mod body;
pub mod cookie;
pub mod error;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod status;

pub use body::{FormData, FormPart, ParsedBody};
pub use cookie::{CookieError, CookieOptions, Priority, SameSite};
pub use error::{ArborError, HttpException, Redirect, Result};
pub use headers::Headers;
pub use method::Method;
pub use request::{Request, Target};
pub use response::{Body, Response};
pub use status::status_text;
