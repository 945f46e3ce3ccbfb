//! The handler chain executor.
//!
//! Handlers run in order; each frame receives a [`Next`] it may invoke at
//! most once to advance the chain. Returning a response commits it to the
//! response slot (the outermost writer wins); returning `None` leaves the
//! slot alone, so downstream responses survive the unwind. Errors bubble
//! to the executor: the `HttpException`/`Redirect` sentinels are turned
//! into their carried responses, everything else into a logged 500.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use arbor_http::{ArborError, Response, Result};
use futures_util::future::BoxFuture;

use crate::context::Context;

/// What one handler frame produces: a committed response, or nothing.
pub type HandlerOutput = Result<Option<Response>>;

/// A request handler. Middleware and terminal handlers share this shape;
/// the only difference is whether they invoke `next`.
pub trait Handler: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, HandlerOutput>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, HandlerOutput> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        self(ctx, next)
    }
}

/// A cheaply clonable handler reference. Equality is function identity,
/// which is what middleware deduplication keys on.
#[derive(Clone)]
pub struct DynHandler(Arc<dyn Handler>);

impl DynHandler {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self(Arc::new(handler))
    }

    pub fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        self.0.call(ctx, next)
    }
}

impl PartialEq for DynHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DynHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynHandler(..)")
    }
}

/// Wraps a handler function into a [`DynHandler`].
pub fn handler_fn<F>(f: F) -> DynHandler
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, HandlerOutput>
        + Send
        + Sync
        + 'static,
{
    DynHandler::new(f)
}

/// The response slot shared by every frame of one chain run.
#[derive(Clone, Default)]
struct ResponseSlot(Arc<Mutex<Option<Response>>>);

impl ResponseSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Response>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put(&self, response: Response) {
        *self.lock() = Some(response);
    }

    fn take(&self) -> Option<Response> {
        self.lock().take()
    }
}

/// Continuation handed to each handler frame.
pub struct Next<'a> {
    handlers: &'a [DynHandler],
    index: usize,
    called: bool,
    slot: ResponseSlot,
}

impl<'a> Next<'a> {
    fn new(handlers: &'a [DynHandler], index: usize, slot: ResponseSlot) -> Self {
        Self {
            handlers,
            index,
            called: false,
            slot,
        }
    }

    /// Runs the remainder of the chain. A second invocation within the
    /// same frame fails with `NextCalledTwice`.
    pub fn run<'b>(&'b mut self, ctx: &'b mut Context) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        if self.called {
            return Box::pin(async { Err(ArborError::NextCalledTwice) });
        }
        self.called = true;
        run_frame(ctx, self.handlers, self.index, self.slot.clone())
    }
}

fn run_frame<'a>(
    ctx: &'a mut Context,
    handlers: &'a [DynHandler],
    index: usize,
    slot: ResponseSlot,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Some(handler) = handlers.get(index) else {
            return Ok(());
        };
        let next = Next::new(handlers, index + 1, slot.clone());
        if let Some(response) = handler.call(ctx, next).await? {
            slot.put(response);
        }
        Ok(())
    })
}

/// Runs `handlers` over `ctx`, falling back to `default_handler` when the
/// chain leaves the response slot empty.
pub async fn execute(
    ctx: &mut Context,
    handlers: &[DynHandler],
    default_handler: &DynHandler,
) -> Response {
    let slot = ResponseSlot::default();

    if let Err(error) = run_frame(ctx, handlers, 0, slot.clone()).await {
        return recover(error);
    }
    if let Some(response) = slot.take() {
        return response;
    }

    let tail = Next::new(&[], 0, slot.clone());
    match default_handler.call(ctx, tail).await {
        Ok(Some(response)) => response,
        Ok(None) => slot.take().unwrap_or_else(Response::not_found),
        Err(error) => recover(error),
    }
}

fn recover(error: ArborError) -> Response {
    match error.response() {
        Some(response) => response,
        None => {
            tracing::error!(%error, "handler chain failed");
            Response::internal_error()
        }
    }
}
