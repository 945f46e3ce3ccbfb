//! Minimal arbor application driven without a transport: requests are
//! constructed by hand and pushed through the dispatch pipeline.
//!
//! Run with:
//!   cargo run -p arbor-core --example hello

use arbor_core::{
    cors_default, Context, DynHandler, Handler, HandlerOutput, Next, Server,
};
use arbor_http::{Method, Request};
use futures_util::future::BoxFuture;

struct Hello;

impl Handler for Hello {
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        Box::pin(async move {
            let name = ctx.param("name").unwrap_or("world").to_string();
            Ok(Some(ctx.text(format!("hello, {}", name))))
        })
    }
}

struct RequestLogger;

impl Handler for RequestLogger {
    fn call<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        Box::pin(async move {
            let method = ctx.request().method();
            let url = ctx.request().url().to_string();
            next.run(ctx).await?;
            println!("{} {} -> {}", method, url, ctx.status());
            Ok(None)
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let server = Server::new();
    server
        .middleware("/", vec![DynHandler::new(RequestLogger), cors_default()])
        .unwrap();
    server.get("/hello/:name?", vec![DynHandler::new(Hello)]).unwrap();
    server.start().await;

    for url in ["/hello/arbor", "/hello", "/missing"] {
        let response = server.dispatch(Request::new(Method::Get, url)).await;
        println!(
            "  body: {:?} (status {})",
            response.body_str().unwrap_or(""),
            response.status()
        );
    }

    server.shutdown().await;
}
