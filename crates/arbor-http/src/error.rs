//! Shared error enum and the response-carrying sentinels.
//!
//! `HttpException` and `Redirect` are the only failures the chain executor
//! recovers locally: both carry a pre-built [`Response`] that is committed
//! verbatim. Everything else bubbling out of a handler chain is logged and
//! converted into a plain 500.

use thiserror::Error;

use crate::cookie::CookieError;
use crate::headers::Headers;
use crate::response::Response;

/// A user-raised HTTP failure carrying its own response.
#[derive(Debug, Clone)]
pub struct HttpException {
    pub status: u16,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub headers: Headers,
}

impl HttpException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            headers: Headers::new(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The response committed when this exception reaches the executor.
    ///
    /// Without `data` the body is the plain-text message; with `data` the
    /// body is the JSON object `{"message": .., "data": ..}`.
    pub fn response(&self) -> Response {
        let response = match &self.data {
            Some(data) => {
                let body = serde_json::json!({
                    "message": self.message,
                    "data": data,
                });
                match Response::json(self.status, &body) {
                    Ok(response) => response,
                    Err(_) => Response::text(self.status, self.message.clone()),
                }
            }
            None => Response::text(self.status, self.message.clone()),
        };
        response.with_headers(&self.headers)
    }
}

/// A redirect sentinel; `status` defaults to 302.
#[derive(Debug, Clone)]
pub struct Redirect {
    pub location: String,
    pub status: u16,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: 302,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn response(&self) -> Response {
        Response::redirect(self.location.clone(), self.status)
    }
}

/// The error type shared by every arbor crate.
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("route table is sealed")]
    MatcherSealed,

    #[error("unsupported path pattern: {0}")]
    UnsupportedPath(String),

    #[error("wildcard must be the final segment: {0}")]
    WildcardMisplacement(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("next() invoked twice in one chain frame")]
    NextCalledTwice,

    #[error("cookie error: {0}")]
    Cookie(#[from] CookieError),

    #[error("http exception: {}", .0.status)]
    Exception(HttpException),

    #[error("redirect to {}", .0.location)]
    Redirect(Redirect),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl ArborError {
    /// The pre-built response for the recoverable sentinels, `None` for
    /// every other variant.
    pub fn response(&self) -> Option<Response> {
        match self {
            ArborError::Exception(exception) => Some(exception.response()),
            ArborError::Redirect(redirect) => Some(redirect.response()),
            _ => None,
        }
    }
}

impl From<HttpException> for ArborError {
    fn from(exception: HttpException) -> Self {
        ArborError::Exception(exception)
    }
}

impl From<Redirect> for ArborError {
    fn from(redirect: Redirect) -> Self {
        ArborError::Redirect(redirect)
    }
}

pub type Result<T> = std::result::Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exception_builds_text_response() {
        let exception = HttpException::new(422, "bad payload").with_header("X-Reason", "validation");
        let response = exception.response();
        assert_eq!(response.status(), 422);
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/plain; charset=UTF-8")
        );
        assert_eq!(response.body_str(), Some("bad payload"));
        assert_eq!(response.headers().get("x-reason"), Some("validation"));
    }

    #[test]
    fn test_exception_data_is_carried_in_the_body() {
        let exception = HttpException::new(422, "bad payload")
            .with_data(json!({"field": "name"}))
            .with_header("X-Reason", "validation");
        let response = exception.response();
        assert_eq!(response.status(), 422);
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        assert_eq!(
            response.body_str(),
            Some(r#"{"data":{"field":"name"},"message":"bad payload"}"#)
        );
        assert_eq!(response.headers().get("x-reason"), Some("validation"));
    }

    #[test]
    fn test_redirect_defaults_to_302() {
        let redirect = Redirect::to("/home");
        assert_eq!(redirect.status, 302);
        let response = redirect.response();
        assert_eq!(response.headers().get("location"), Some("/home"));
    }

    #[test]
    fn test_sentinels_expose_responses() {
        let error: ArborError = HttpException::new(404, "missing").into();
        assert_eq!(error.response().unwrap().status(), 404);

        let error: ArborError = Redirect::to("/x").with_status(301).into();
        assert_eq!(error.response().unwrap().status(), 301);

        assert!(ArborError::MatcherSealed.response().is_none());
    }
}
