//! Tests against a real listening socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use library_api::api::{ApiRequest, ApiState, EchoHandler, Handler, HandlerResult, Payload, RequestContext};
use library_api::lifecycle::Shutdown;
use library_api::net::Listener;
use library_api::{HttpServer, ServerConfig};

mod common;

/// Sleeps before answering, to keep a request in flight.
struct SlowHandler {
    delay: Duration,
    completed: Arc<AtomicUsize>,
}

impl SlowHandler {
    fn new(delay: Duration) -> Self {
        Self { delay, completed: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl Handler for SlowHandler {
    async fn handle(&self, _ctx: &RequestContext, _request: &ApiRequest) -> HandlerResult {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Payload::json(&json!({"done": true}))
    }
}

async fn start(handler: Arc<dyn Handler>, shutdown: &Shutdown) -> (SocketAddr, JoinHandle<()>) {
    let (addr, handle, _) = start_with(ServerConfig::default(), handler, shutdown).await;
    (addr, handle)
}

async fn start_with(
    config: ServerConfig,
    handler: Arc<dyn Handler>,
    shutdown: &Shutdown,
) -> (SocketAddr, JoinHandle<()>, ApiState) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64);

    let server = HttpServer::new(config, handler);
    let state = server.state().clone();
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });
    (addr, handle, state)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_echo_over_the_wire() {
    let shutdown = Shutdown::new();
    let (addr, handle) = start(Arc::new(EchoHandler::new("library")), &shutdown).await;

    let res = client()
        .post(format!("http://{addr}/api/books?limit=5"))
        .header("Authorization", "Bearer token")
        .body(r#"{"title":"Roadside Picnic"}"#)
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-encoding"], "gzip");
    let body = res.bytes().await.unwrap();
    let reply: Value = serde_json::from_str(&common::gunzip(&body)).unwrap();
    assert_eq!(reply["service"], "library");
    assert_eq!(reply["method"], "POST");
    assert_eq!(reply["path"], "/api/books");
    assert_eq!(reply["query"], "limit=5");
    assert_eq!(reply["authenticated"], true);
    assert_eq!(reply["body"], json!({"title": "Roadside Picnic"}));

    let res = client()
        .put(format!("http://{addr}/api/books"))
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    assert!(res.headers().get("content-encoding").is_none());
    let envelope: Value = serde_json::from_slice(&res.bytes().await.unwrap()).unwrap();
    assert_eq!(envelope, json!({"ErrorCode": 30, "Cause": "invalid JSON body"}));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_requests() {
    let shutdown = Shutdown::new();
    let handler = Arc::new(SlowHandler::new(Duration::from_millis(300)));
    let (addr, handle) = start(handler, &shutdown).await;

    let in_flight = tokio::spawn(async move {
        client().get(format!("http://{addr}/api/slow")).send().await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    let res = in_flight.await.unwrap().expect("in-flight request should complete");
    assert_eq!(res.status(), 200);
    let body = res.bytes().await.unwrap();
    assert_eq!(common::gunzip(&body), "{\"done\":true}\n");

    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    let refused = client().get(format!("http://{addr}/api/slow")).send().await;
    assert!(refused.is_err(), "listener should be closed after shutdown");
}

#[tokio::test]
async fn test_write_deadline_closes_connection_but_handler_completes() {
    let mut config = ServerConfig::default();
    config.timeouts.write_secs = 1;
    let handler = SlowHandler::new(Duration::from_millis(1500));
    let completed = Arc::clone(&handler.completed);

    let shutdown = Shutdown::new();
    let (addr, handle, state) = start_with(config, Arc::new(handler), &shutdown).await;

    let res = client().get(format!("http://{addr}/api/slow")).send().await;
    // No status is invented for a late response; the connection is closed.
    assert!(res.is_err(), "expected a closed connection, got {:?}", res.map(|r| r.status()));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 1, "handler must run to completion");
    assert_eq!(state.request_pool().stats().outstanding(), 0);
    assert_eq!(state.buffer_pool().stats().outstanding(), 0);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
}
