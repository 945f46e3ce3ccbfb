//! Plugin lifecycle: the init barrier, deferred dispatch replay, failure
//! isolation and reverse-order disposal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbor_core::{
    Context, Disposer, DynHandler, Handler, HandlerOutput, Next, Plugin, PluginContext,
    PluginState, Server,
};
use arbor_http::{Method, Request, Result};
use futures_util::future::BoxFuture;

type Trace = Arc<Mutex<Vec<String>>>;

struct Text(&'static str);

impl Handler for Text {
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, HandlerOutput> {
        Box::pin(async move { Ok(Some(ctx.text(self.0))) })
    }
}

struct SlowPlugin {
    name: &'static str,
    delay: Duration,
    ready: Arc<AtomicBool>,
    trace: Trace,
}

impl Plugin for SlowPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn on_init<'a>(&'a self, _ctx: PluginContext<'a>) -> BoxFuture<'a, Result<Option<Disposer>>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.ready.store(true, Ordering::SeqCst);
            self.trace.lock().unwrap().push(format!("init:{}", self.name));

            let trace = self.trace.clone();
            let name = self.name;
            let disposer: Disposer = Box::new(move || {
                Box::pin(async move {
                    trace.lock().unwrap().push(format!("dispose:{}", name));
                    Ok(())
                }) as BoxFuture<'static, Result<()>>
            });
            Ok(Some(disposer))
        })
    }
}

struct FailingPlugin;

impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        "broken"
    }

    fn on_init<'a>(&'a self, _ctx: PluginContext<'a>) -> BoxFuture<'a, Result<Option<Disposer>>> {
        Box::pin(async move { Err(arbor_http::ArborError::Internal("refused to boot".into())) })
    }
}

struct RoutingPlugin;

impl Plugin for RoutingPlugin {
    fn name(&self) -> &str {
        "router"
    }

    fn on_init<'a>(&'a self, ctx: PluginContext<'a>) -> BoxFuture<'a, Result<Option<Disposer>>> {
        Box::pin(async move {
            ctx.server
                .get("/from-plugin", vec![DynHandler::new(Text("plugged"))])?;
            ctx.globals().set("plugin:router", serde_json::json!(true));
            Ok(None)
        })
    }
}

#[tokio::test]
async fn requests_during_init_are_deferred_and_replayed_in_arrival_order() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let ready = Arc::new(AtomicBool::new(false));

    let server = Arc::new(Server::new());
    server.get("/:n", vec![DynHandler::new(Text("ok"))]).unwrap();
    server.plugin(SlowPlugin {
        name: "slow",
        delay: Duration::from_millis(50),
        ready: ready.clone(),
        trace: trace.clone(),
    });

    let event_trace = trace.clone();
    let event_ready = ready.clone();
    server.events().request.on(move |event| {
        let trace = event_trace.clone();
        let ready = event_ready.clone();
        Box::pin(async move {
            trace.lock().unwrap().push(format!(
                "request:{}:{}",
                event.context.path,
                if ready.load(Ordering::SeqCst) { "after-init" } else { "before-init" }
            ));
            Ok(())
        }) as BoxFuture<'static, Result<()>>
    });

    // Initialization starts first; the two requests arrive at t=0 and
    // t=10ms, well inside the 50ms init window.
    let starter = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let first = {
        let server = server.clone();
        tokio::spawn(async move { server.dispatch(Request::new(Method::Get, "/one")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let server = server.clone();
        tokio::spawn(async move { server.dispatch(Request::new(Method::Get, "/two")).await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    starter.await.unwrap();

    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);
    assert_eq!(
        *trace.lock().unwrap(),
        vec![
            "init:slow",
            "request:/one:after-init",
            "request:/two:after-init"
        ]
    );
}

#[tokio::test]
async fn plugins_initialize_in_registration_order() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let server = Server::new();
    for name in ["a", "b", "c"] {
        server.plugin(SlowPlugin {
            name: Box::leak(name.to_string().into_boxed_str()),
            delay: Duration::from_millis(1),
            ready: Arc::new(AtomicBool::new(false)),
            trace: trace.clone(),
        });
    }

    server.start().await;

    assert_eq!(*trace.lock().unwrap(), vec!["init:a", "init:b", "init:c"]);
    assert!(server
        .plugin_states()
        .iter()
        .all(|(_, state)| *state == PluginState::Ready));
}

#[tokio::test]
async fn a_failing_plugin_does_not_stop_the_others() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let server = Server::new();
    server.plugin(FailingPlugin);
    server.plugin(SlowPlugin {
        name: "survivor",
        delay: Duration::from_millis(1),
        ready: Arc::new(AtomicBool::new(false)),
        trace: trace.clone(),
    });

    server.start().await;

    let states = server.plugin_states();
    assert_eq!(states[0], ("broken".to_string(), PluginState::Failed));
    assert_eq!(states[1], ("survivor".to_string(), PluginState::Ready));
    assert_eq!(*trace.lock().unwrap(), vec!["init:survivor"]);
}

#[tokio::test]
async fn plugins_can_register_routes_and_seed_globals() {
    let server = Server::new();
    server.plugin(RoutingPlugin);

    let response = server
        .dispatch(Request::new(Method::Get, "/from-plugin"))
        .await;
    assert_eq!(response.body_str(), Some("plugged"));
    assert_eq!(
        server.globals().get("plugin:router"),
        Some(serde_json::json!(true))
    );
}

#[tokio::test]
async fn disposers_run_in_reverse_registration_order() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let server = Server::new();
    for name in ["first", "second"] {
        server.plugin(SlowPlugin {
            name: Box::leak(name.to_string().into_boxed_str()),
            delay: Duration::from_millis(1),
            ready: Arc::new(AtomicBool::new(false)),
            trace: trace.clone(),
        });
    }

    server.start().await;
    server.shutdown().await;

    assert_eq!(
        *trace.lock().unwrap(),
        vec![
            "init:first",
            "init:second",
            "dispose:second",
            "dispose:first"
        ]
    );
}

#[tokio::test]
async fn shutdown_clears_event_subscriptions() {
    let server = Server::new();
    server
        .events()
        .request
        .on(|_| Box::pin(async { Ok(()) }) as BoxFuture<'static, Result<()>>);
    assert_eq!(server.events().request.subscriber_count(), 1);

    server.shutdown().await;
    assert_eq!(server.events().request.subscriber_count(), 0);
}
