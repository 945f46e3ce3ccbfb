//! Server core: registration API, dispatch orchestration, plugin and
//! event ownership.
//!
//! The server is configured (routes, middlewares, plugins), then shared
//! behind an `Arc` with a transport adapter that calls [`Server::dispatch`]
//! per request. The first dispatch (or an explicit [`Server::start`]) runs
//! plugin initialization; requests arriving while that is in flight park
//! on the init gate and replay in arrival order. Once dispatch has begun
//! the route table is sealed and late registrations are warned and
//! ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use arbor_http::{ArborError, Headers, Method, Request, Response, Result};
use arbor_router::matcher::parse_query;
use arbor_router::pattern::{canonical, normalize};
use arbor_router::{Backend, Matcher, Params, RouteDescriptor};
use futures_util::future::BoxFuture;

use crate::chain::{self, DynHandler, Handler, HandlerOutput, Next};
use crate::context::{Context, Globals};
use crate::env::Env;
use crate::events::{next_route_id, EventBus, RequestContext, RequestEvent, ResponseEvent};
use crate::plugin::{Disposer, GateEntry, InitGate, Plugin, PluginContext, PluginSlot, PluginState};

struct RouteRecord {
    method: Method,
    path: String,
    handlers: Vec<DynHandler>,
}

struct MiddlewareRecord {
    pattern: String,
    handlers: Vec<DynHandler>,
}

struct NotFoundHandler;

impl Handler for NotFoundHandler {
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        Box::pin(async move { Ok(Some(ctx.text_with("Not Found", 404, &Headers::new()))) })
    }
}

fn join_paths(base: &str, path: &str) -> String {
    let mut tokens = normalize(base);
    tokens.extend(normalize(path));
    canonical(&tokens)
}

/// The HTTP framework core.
pub struct Server {
    matcher: RwLock<Box<dyn Matcher<DynHandler>>>,
    records: Mutex<Vec<RouteRecord>>,
    middleware_records: Mutex<Vec<MiddlewareRecord>>,
    base_path: String,
    events: EventBus,
    plugins: Mutex<Vec<PluginSlot>>,
    disposers: Mutex<Vec<(String, Disposer)>>,
    gate: InitGate,
    sealed: AtomicBool,
    globals: Globals,
    env: Env,
    default_handler: DynHandler,
}

impl Server {
    /// A server on the recommended regexp backend.
    pub fn new() -> Self {
        Self::with_backend(Backend::Regexp)
    }

    pub fn with_backend(backend: Backend) -> Self {
        Self {
            matcher: RwLock::new(backend.build()),
            records: Mutex::new(Vec::new()),
            middleware_records: Mutex::new(Vec::new()),
            base_path: "/".to_string(),
            events: EventBus::new(),
            plugins: Mutex::new(Vec::new()),
            disposers: Mutex::new(Vec::new()),
            gate: InitGate::new(),
            sealed: AtomicBool::new(false),
            globals: Globals::new(),
            env: Env::capture(),
            default_handler: DynHandler::new(NotFoundHandler),
        }
    }

    /// Prefixes every subsequent registration with `base`.
    pub fn with_base_path(mut self, base: &str) -> Self {
        self.base_path = canonical(&normalize(base));
        self
    }

    /// Replaces the captured process environment, mostly for embedders
    /// and tests.
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    fn read_matcher(&self) -> RwLockReadGuard<'_, Box<dyn Matcher<DynHandler>>> {
        self.matcher.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_matcher(&self) -> RwLockWriteGuard<'_, Box<dyn Matcher<DynHandler>>> {
        self.matcher.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_records(&self) -> MutexGuard<'_, Vec<RouteRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_middleware_records(&self) -> MutexGuard<'_, Vec<MiddlewareRecord>> {
        self.middleware_records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_plugins(&self) -> MutexGuard<'_, Vec<PluginSlot>> {
        self.plugins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_disposers(&self) -> MutexGuard<'_, Vec<(String, Disposer)>> {
        self.disposers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Whether dispatch has begun and the route table is frozen.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Every registered route, in registration order.
    pub fn routes(&self) -> Vec<RouteDescriptor> {
        self.read_matcher().routes()
    }

    // -- registration -----------------------------------------------------

    fn register(&self, method: Method, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        let full = join_paths(&self.base_path, path);
        if self.is_sealed() {
            tracing::warn!(method = %method, path = %full, "route registered after dispatch began; ignored");
            return Ok(());
        }
        let outcome = self.write_matcher().add(method, &full, handlers.clone());
        match outcome {
            Ok(()) => {
                self.lock_records().push(RouteRecord {
                    method,
                    path: full,
                    handlers,
                });
                Ok(())
            }
            Err(ArborError::MatcherSealed) => {
                tracing::warn!(method = %method, path = %full, "route registered after the matcher sealed; ignored");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Registers a route from a `"METHOD /path"` spec; a spec without a
    /// leading method token registers for every method.
    pub fn on(&self, spec: &str, handlers: Vec<DynHandler>) -> Result<()> {
        let (method, path) = match spec.split_once(' ') {
            Some((token, rest)) => (token.parse::<Method>()?, rest.trim()),
            None => (Method::All, spec),
        };
        self.register(method, path, handlers)
    }

    pub fn get(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Get, path, handlers)
    }

    pub fn post(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Post, path, handlers)
    }

    pub fn put(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Put, path, handlers)
    }

    pub fn delete(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Delete, path, handlers)
    }

    pub fn patch(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Patch, path, handlers)
    }

    pub fn options(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Options, path, handlers)
    }

    pub fn head(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Head, path, handlers)
    }

    pub fn trace(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Trace, path, handlers)
    }

    pub fn connect(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::Connect, path, handlers)
    }

    pub fn all(&self, path: &str, handlers: Vec<DynHandler>) -> Result<()> {
        self.register(Method::All, path, handlers)
    }

    /// Binds method-agnostic middleware at `pattern` (`"/"` for global).
    pub fn middleware(&self, pattern: &str, handlers: Vec<DynHandler>) -> Result<()> {
        let full = join_middleware_pattern(&self.base_path, pattern);
        if self.is_sealed() {
            tracing::warn!(pattern = %full, "middleware registered after dispatch began; ignored");
            return Ok(());
        }
        let outcome = self.write_matcher().push_middlewares(&full, handlers.clone());
        match outcome {
            Ok(()) => {
                self.lock_middleware_records().push(MiddlewareRecord {
                    pattern: full,
                    handlers,
                });
                Ok(())
            }
            Err(ArborError::MatcherSealed) => {
                tracing::warn!(pattern = %full, "middleware registered after the matcher sealed; ignored");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Mounts another server's routes and middlewares under `base`.
    pub fn route(&self, base: &str, sub: &Server) -> Result<()> {
        let middleware_records: Vec<(String, Vec<DynHandler>)> = sub
            .lock_middleware_records()
            .iter()
            .map(|record| (record.pattern.clone(), record.handlers.clone()))
            .collect();
        for (pattern, handlers) in middleware_records {
            self.middleware(&join_middleware_pattern(base, &pattern), handlers)?;
        }

        let records: Vec<(Method, String, Vec<DynHandler>)> = sub
            .lock_records()
            .iter()
            .map(|record| (record.method, record.path.clone(), record.handlers.clone()))
            .collect();
        for (method, path, handlers) in records {
            self.register(method, &join_paths(base, &path), handlers)?;
        }
        Ok(())
    }

    /// Registers a plugin. Initialization runs on [`Server::start`] or the
    /// first dispatch, in registration order.
    pub fn plugin(&self, plugin: impl Plugin + 'static) {
        self.lock_plugins().push(PluginSlot {
            plugin: Box::new(plugin),
            state: PluginState::Registered,
        });
    }

    pub fn plugin_states(&self) -> Vec<(String, PluginState)> {
        self.lock_plugins()
            .iter()
            .map(|slot| (slot.plugin.name().to_string(), slot.state))
            .collect()
    }

    // -- lifecycle --------------------------------------------------------

    /// Runs plugin initialization if it has not run yet, and waits for it
    /// otherwise.
    pub async fn start(&self) {
        self.barrier().await;
    }

    async fn barrier(&self) {
        match self.gate.enter() {
            GateEntry::Proceed => {}
            GateEntry::RunInit => {
                self.run_init().await;
                self.gate.open();
            }
            GateEntry::Wait(ticket) => {
                let _ = ticket.await;
                // Replay deferred dispatches on a fresh scheduling tick.
                tokio::task::yield_now().await;
            }
        }
    }

    async fn run_init(&self) {
        let mut slots = std::mem::take(&mut *self.lock_plugins());

        for slot in slots.iter_mut() {
            slot.state = PluginState::Initializing;
            let name = slot.plugin.name().to_string();
            match slot.plugin.on_init(PluginContext { server: self }).await {
                Ok(disposer) => {
                    if let Some(disposer) = disposer {
                        self.lock_disposers().push((name.clone(), disposer));
                    }
                    slot.state = PluginState::Ready;
                    tracing::info!(plugin = %name, "plugin ready");
                }
                Err(error) => {
                    slot.state = PluginState::Failed;
                    tracing::error!(plugin = %name, %error, "plugin initialization failed");
                }
            }
        }

        {
            let mut plugins = self.lock_plugins();
            let late = std::mem::replace(&mut *plugins, slots);
            if !late.is_empty() {
                tracing::warn!(
                    count = late.len(),
                    "plugins registered during initialization are not initialized"
                );
                plugins.extend(late);
            }
        }

        {
            let mut matcher = self.write_matcher();
            matcher.seal();
            for route in matcher.routes() {
                tracing::debug!(method = %route.method, path = %route.path, "route registered");
            }
        }
        self.sealed.store(true, Ordering::Release);
    }

    /// Disposes `Ready` plugins in reverse registration order and drops
    /// event subscriptions.
    pub async fn shutdown(&self) {
        let disposers = std::mem::take(&mut *self.lock_disposers());
        for (name, disposer) in disposers.into_iter().rev() {
            if let Err(error) = disposer().await {
                tracing::warn!(plugin = %name, %error, "plugin disposer failed");
            }
        }
        self.events.clear();
        tracing::info!("server shut down");
    }

    // -- dispatch ---------------------------------------------------------

    /// Runs one request through the pipeline and returns its response.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.barrier().await;

        let method = request.method();
        let path = request.target().path.to_string();

        let matched = {
            let matcher = self.read_matcher();
            matcher.lookup(method, request.url())
        };

        let (params, query, matched_path, handlers) = match matched {
            Some(matched) => {
                let mut handlers = matched.middlewares;
                handlers.extend(matched.data);
                (
                    matched.params,
                    matched.search_params,
                    Some(matched.matched_path),
                    handlers,
                )
            }
            None => (
                Params::new(),
                parse_query(request.target().query),
                None,
                Vec::new(),
            ),
        };

        let snapshot = Arc::new(RequestContext {
            route_id: next_route_id(),
            method,
            path,
            params: params.clone(),
            query: query.clone(),
            globals: self.globals.clone(),
        });

        self.events
            .request
            .emit(RequestEvent {
                context: Arc::clone(&snapshot),
                headers: request.headers().clone(),
            })
            .await;

        let mut ctx = Context::new(
            request,
            params,
            query,
            matched_path,
            self.globals.clone(),
            self.env.clone(),
        );
        let response = chain::execute(&mut ctx, &handlers, &self.default_handler).await;

        self.events
            .response
            .emit(ResponseEvent {
                context: snapshot,
                status: response.status(),
                headers: response.headers().clone(),
            })
            .await;

        response
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

fn join_middleware_pattern(base: &str, pattern: &str) -> String {
    let base_tokens = normalize(base);
    if base_tokens.is_empty() {
        return canonical(&normalize(pattern));
    }
    let mut tokens = base_tokens;
    tokens.extend(normalize(pattern));
    canonical(&tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/api", "/users"), "/api/users");
        assert_eq!(join_paths("/api", "/"), "/api");
        assert_eq!(join_paths("/", "/"), "/");
    }

    #[test]
    fn test_join_middleware_pattern() {
        assert_eq!(join_middleware_pattern("/", "*"), "/*");
        assert_eq!(join_middleware_pattern("/", "/api/*"), "/api/*");
        assert_eq!(join_middleware_pattern("/sub", "*"), "/sub/*");
        assert_eq!(join_middleware_pattern("/sub", "/"), "/sub");
    }
}
