//! Arbor Server Core
//!
//! The dispatch pipeline of the arbor framework: route registration,
//! the ordered handler chain, the per-request context, lifecycle events
//! and the plugin subsystem. Transport adapters sit outside this crate;
//! they construct an [`arbor_http::Request`] per incoming request, call
//! [`Server::dispatch`], and write the returned [`arbor_http::Response`]
//! to the wire.
//!
//! # Architecture
//!
//! A request flows through the core as:
//!
//! 1. the plugin-init barrier (requests arriving before plugins finish
//!    initializing are deferred and replayed in arrival order)
//! 2. matcher lookup via the configured [`arbor_router::Backend`]
//! 3. `server:request` emission
//! 4. the handler chain (middlewares, then route handlers, then the
//!    default 404), assembling a response in the [`Context`]
//! 5. `server:response` emission
//!
//! # Example
//!
//! ```
//! use arbor_core::{DynHandler, Handler, HandlerOutput, Next, Server};
//! use arbor_core::Context;
//! use arbor_http::{Method, Request};
//! use futures_util::future::BoxFuture;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
//!         Box::pin(async move { Ok(Some(ctx.text("hello world"))) })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let server = Server::new();
//! server.get("/", vec![DynHandler::new(Hello)]).unwrap();
//!
//! let response = server.dispatch(Request::new(Method::Get, "/")).await;
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body_str(), Some("hello world"));
//! # }
//! ```

pub mod chain;
pub mod context;
pub mod env;
pub mod events;
pub mod middleware;
pub mod plugin;
pub mod server;

pub use chain::{execute, handler_fn, DynHandler, Handler, HandlerOutput, Next};
pub use context::{Context, Globals, GlobalsView};
pub use env::Env;
pub use events::{EventBus, RequestContext, RequestEvent, ResponseEvent, SubscriptionId};
pub use middleware::{cors, cors_default, CorsConfig};
pub use plugin::{Disposer, Plugin, PluginContext, PluginState};
pub use server::Server;
