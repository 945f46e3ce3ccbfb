//! Plugin lifecycle and the initialization barrier.
//!
//! Plugins initialize exactly once, in registration order, before any
//! request runs the dispatch pipeline. Requests that arrive while
//! initialization is still in flight park on the gate and are replayed in
//! arrival order once it opens, each on a fresh scheduling tick.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use arbor_http::Result;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use crate::context::Globals;
use crate::env::Env;
use crate::events::EventBus;
use crate::server::Server;

/// Cleanup returned by `on_init`, invoked at shutdown in reverse
/// registration order.
pub type Disposer = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// What `on_init` receives: the server (routes and middlewares may still
/// be registered here) and its event channels.
pub struct PluginContext<'a> {
    pub server: &'a Server,
}

impl PluginContext<'_> {
    pub fn events(&self) -> &EventBus {
        self.server.events()
    }

    pub fn globals(&self) -> Globals {
        self.server.globals().clone()
    }

    pub fn env(&self) -> &Env {
        self.server.env()
    }
}

/// An extension unit with an initialization hook.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Runs once before dispatch begins. May register routes, subscribe
    /// to events, seed globals, and return a disposer.
    fn on_init<'a>(&'a self, ctx: PluginContext<'a>) -> BoxFuture<'a, Result<Option<Disposer>>>;
}

/// Lifecycle of one registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Initializing,
    Ready,
    Failed,
}

pub(crate) struct PluginSlot {
    pub plugin: Box<dyn Plugin>,
    pub state: PluginState,
}

/// Outcome of [`InitGate::enter`].
pub(crate) enum GateEntry {
    /// Initialization already completed; dispatch immediately.
    Proceed,
    /// The caller won the race and must run initialization, then open.
    RunInit,
    /// Initialization is in flight; await the ticket, then yield.
    Wait(oneshot::Receiver<()>),
}

enum GateState {
    Idle,
    Initializing(VecDeque<oneshot::Sender<()>>),
    Open,
}

/// The plugin-init barrier.
///
/// Waiters queue in arrival order; opening the gate fires their tickets
/// in that same order.
pub(crate) struct InitGate {
    state: Mutex<GateState>,
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enter(&self) -> GateEntry {
        let mut state = self.lock();
        match &mut *state {
            GateState::Open => GateEntry::Proceed,
            GateState::Idle => {
                *state = GateState::Initializing(VecDeque::new());
                GateEntry::RunInit
            }
            GateState::Initializing(queue) => {
                let (sender, receiver) = oneshot::channel();
                queue.push_back(sender);
                GateEntry::Wait(receiver)
            }
        }
    }

    /// Opens the gate and releases parked requests in arrival order.
    pub fn open(&self) {
        let waiters = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, GateState::Open) {
                GateState::Initializing(queue) => queue,
                _ => VecDeque::new(),
            }
        };
        for sender in waiters {
            // A dropped receiver means the request was cancelled.
            let _ = sender.send(());
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.lock(), GateState::Open)
    }
}
