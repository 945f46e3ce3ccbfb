//! Bundled middleware.
//!
//! Only CORS ships with the core; everything else (compression, auth,
//! rate limiting) belongs to plugins or applications.

use arbor_http::{Headers, Method, Response};
use futures_util::future::BoxFuture;

use crate::chain::{DynHandler, Handler, HandlerOutput, Next};
use crate::context::Context;

/// CORS policy for the [`cors`] middleware.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// `*` or one concrete origin.
    pub origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: Option<u64>,
    pub credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            allow_methods: ["GET", "HEAD", "PUT", "POST", "DELETE", "PATCH"]
                .map(String::from)
                .to_vec(),
            allow_headers: Vec::new(),
            expose_headers: Vec::new(),
            max_age: None,
            credentials: false,
        }
    }
}

struct Cors {
    config: CorsConfig,
}

impl Handler for Cors {
    fn call<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        Box::pin(async move {
            let config = &self.config;

            ctx.set_header("Access-Control-Allow-Origin", config.origin.clone());
            // With a wildcard origin the response does not vary by it.
            if config.origin != "*" {
                ctx.set_header("Vary", "Origin");
            }
            if config.credentials {
                ctx.set_header("Access-Control-Allow-Credentials", "true");
            }
            if !config.expose_headers.is_empty() {
                let values: Vec<&str> =
                    config.expose_headers.iter().map(String::as_str).collect();
                ctx.set_header_values("Access-Control-Expose-Headers", &values);
            }

            if ctx.request().method() == Method::Options {
                if let Some(max_age) = config.max_age {
                    ctx.set_header("Access-Control-Max-Age", max_age.to_string());
                }
                if !config.allow_methods.is_empty() {
                    let values: Vec<&str> =
                        config.allow_methods.iter().map(String::as_str).collect();
                    ctx.set_header_values("Access-Control-Allow-Methods", &values);
                }
                let allow_headers: Vec<String> = if config.allow_headers.is_empty() {
                    ctx.request()
                        .header("Access-Control-Request-Headers")
                        .map(|raw| raw.split(',').map(|h| h.trim().to_string()).collect())
                        .unwrap_or_default()
                } else {
                    config.allow_headers.clone()
                };
                if !allow_headers.is_empty() {
                    let values: Vec<&str> = allow_headers.iter().map(String::as_str).collect();
                    ctx.set_header_values("Access-Control-Allow-Headers", &values);
                    ctx.set_header("Vary", "Access-Control-Request-Headers");
                }
                // Preflight: answer directly, the chain does not continue.
                return Ok(Some(Response::new(204).with_headers(ctx.headers())));
            }

            next.run(ctx).await?;
            Ok(None)
        })
    }
}

/// CORS middleware with the given policy.
pub fn cors(config: CorsConfig) -> DynHandler {
    DynHandler::new(Cors { config })
}

/// CORS middleware with the permissive default policy.
pub fn cors_default() -> DynHandler {
    cors(CorsConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_http::Request;
    use arbor_router::Params;
    use crate::chain;
    use crate::context::Globals;
    use crate::env::Env;

    fn context(request: Request) -> Context {
        Context::new(
            request,
            Params::new(),
            Vec::new(),
            None,
            Globals::new(),
            Env::from_pairs::<_, &str, &str>([]),
        )
    }

    struct Hello;

    impl Handler for Hello {
        fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
            Box::pin(async move { Ok(Some(ctx.text("hello"))) })
        }
    }

    #[tokio::test]
    async fn test_wildcard_origin_without_vary() {
        let request = Request::new(Method::Get, "/a").with_header("Origin", "https://x");
        let mut ctx = context(request);
        let handlers = vec![
            cors(CorsConfig {
                expose_headers: vec!["X-Foo".to_string()],
                ..Default::default()
            }),
            DynHandler::new(Hello),
        ];
        let not_found = DynHandler::new(Hello);
        let response = chain::execute(&mut ctx, &handlers, &not_found).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some("*")
        );
        assert_eq!(
            response.headers().get("Access-Control-Expose-Headers"),
            Some("X-Foo")
        );
        assert_eq!(response.headers().get("Vary"), None);
        assert_eq!(response.body_str(), Some("hello"));
    }

    #[tokio::test]
    async fn test_concrete_origin_sets_vary() {
        let request = Request::new(Method::Get, "/a");
        let mut ctx = context(request);
        let handlers = vec![
            cors(CorsConfig {
                origin: "https://app.example".to_string(),
                ..Default::default()
            }),
            DynHandler::new(Hello),
        ];
        let not_found = DynHandler::new(Hello);
        let response = chain::execute(&mut ctx, &handlers, &not_found).await;
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some("https://app.example")
        );
        assert_eq!(response.headers().get("Vary"), Some("Origin"));
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_with_204() {
        let request = Request::new(Method::Options, "/a")
            .with_header("Origin", "https://x")
            .with_header("Access-Control-Request-Headers", "X-Custom, X-Other");
        let mut ctx = context(request);
        let handlers = vec![cors_default(), DynHandler::new(Hello)];
        let not_found = DynHandler::new(Hello);
        let response = chain::execute(&mut ctx, &handlers, &not_found).await;

        assert_eq!(response.status(), 204);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Methods"),
            Some("GET, HEAD, PUT, POST, DELETE, PATCH")
        );
        assert_eq!(
            response.headers().get("Access-Control-Allow-Headers"),
            Some("X-Custom, X-Other")
        );
        // The terminal handler never ran.
        assert_ne!(response.body_str(), Some("hello"));
    }
}
