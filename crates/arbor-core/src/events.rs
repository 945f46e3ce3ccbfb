//! Lifecycle event bus.
//!
//! Two typed channels, `server:request` and `server:response`, with
//! insertion-ordered subscriber lists. Emission fans out to every
//! subscriber and awaits them all; a failing subscriber is logged and
//! never aborts the emission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use arbor_http::{Headers, Method, Result};
use arbor_router::Params;
use futures_util::future::{join_all, BoxFuture};

use crate::context::Globals;

/// Per-request identifier: seconds since the epoch in the upper 32 bits,
/// an atomic counter in the lower 32. Unique across restarts and within
/// one process.
pub fn next_route_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    (timestamp << 32) | (counter & 0xFFFF_FFFF)
}

/// The request-scoped snapshot passed to lifecycle subscribers.
#[derive(Clone)]
pub struct RequestContext {
    pub route_id: u64,
    pub method: Method,
    pub path: String,
    pub params: Params,
    pub query: Vec<(String, String)>,
    pub globals: Globals,
}

/// Payload of the `server:request` channel.
#[derive(Clone)]
pub struct RequestEvent {
    pub context: Arc<RequestContext>,
    pub headers: Headers,
}

/// Payload of the `server:response` channel.
#[derive(Clone)]
pub struct ResponseEvent {
    pub context: Arc<RequestContext>,
    pub status: u16,
    pub headers: Headers,
}

type Subscriber<E> = Arc<dyn Fn(E) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Identifier returned by `on`, accepted by `off`.
pub type SubscriptionId = u64;

/// One named event channel with an insertion-ordered subscriber list.
pub struct Channel<E> {
    name: &'static str,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<E>)>>,
    next_id: AtomicU64,
}

impl<E: Clone + Send + 'static> Channel<E> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber<E>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribes; the returned id unsubscribes via [`Channel::off`].
    pub fn on<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(E) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, Arc::new(subscriber)));
        id
    }

    /// Removes a subscription; returns whether it existed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Fans the event out to every subscriber and awaits completion.
    /// Subscriber failures are logged, never propagated.
    pub async fn emit(&self, event: E) {
        let subscribers: Vec<Subscriber<E>> =
            self.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        if subscribers.is_empty() {
            return;
        }
        let results = join_all(
            subscribers
                .iter()
                .map(|subscriber| subscriber(event.clone())),
        )
        .await;
        for result in results {
            if let Err(error) = result {
                tracing::warn!(channel = self.name, %error, "event subscriber failed");
            }
        }
    }
}

/// The server's channels.
pub struct EventBus {
    pub request: Channel<RequestEvent>,
    pub response: Channel<ResponseEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            request: Channel::new("server:request"),
            response: Channel::new("server:response"),
        }
    }

    /// Drops every subscription on every channel.
    pub fn clear(&self) {
        self.request.clear();
        self.response.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
