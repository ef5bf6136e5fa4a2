//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the API pipeline at the configured prefix
//! - Wire up middleware (request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 connections with a header read timeout
//! - Close a connection whose response misses the write deadline
//! - Drain in-flight connections on shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    routing::any,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::api::pipeline::api_handler;
use crate::api::{ApiState, Handler, ResponseEncoder};
use crate::config::ServerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::Listener;

/// Pause after a failed accept, so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP server for the API endpoint.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    state: ApiState,
}

impl HttpServer {
    /// Create a new HTTP server serving `handler`.
    pub fn new(config: ServerConfig, handler: Arc<dyn Handler>) -> Self {
        let encoder = ResponseEncoder::new(config.response.gzip_level);
        let state = ApiState::new(handler, &config.pool, encoder);
        let router = Self::build_router(&config, state.clone());
        Self { router, config, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: ApiState) -> Router {
        let mount = config.listener.mount_path.as_str();

        Router::new()
            .route(mount, any(api_handler))
            .route(&format!("{mount}{{*rest}}"), any(api_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.config.listener.mount_path,
            "HTTP server starting"
        );

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(self.config.timeouts.read_header_secs));

        let graceful = GracefulShutdown::new();
        let write_timeout = Duration::from_secs(self.config.timeouts.write_secs);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let service = with_write_deadline(self.router.clone(), write_timeout);
                    let service = TowerToHyperService::new(service);
                    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn.into_owned());

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(peer_addr = %peer_addr, error = %e, "Connection closed with error");
                        }
                        drop(permit);
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        self.drain(graceful).await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn drain(&self, graceful: GracefulShutdown) {
        let grace = self.config.timeouts.shutdown_grace_secs;
        if grace == 0 {
            graceful.shutdown().await;
            return;
        }

        match tokio::time::timeout(Duration::from_secs(grace), graceful.shutdown()).await {
            Ok(()) => tracing::info!("All connections drained"),
            Err(_) => tracing::warn!(grace_secs = grace, "Grace period elapsed with connections still open"),
        }
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Endpoint state, exposing the pools.
    pub fn state(&self) -> &ApiState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Bound the time from receiving a request to handing its response to the
/// connection.
///
/// A late response is never written: the service errors, and hyper closes
/// the connection without sending a status. The pipeline runs on its own task,
/// so the handler still completes and logs the status it produced.
fn with_write_deadline<B>(
    router: Router,
    write_timeout: Duration,
) -> impl tower::Service<
    Request<B>,
    Response = Response<Body>,
    Error = std::io::Error,
    Future = impl Future<Output = Result<Response<Body>, std::io::Error>> + Send,
> + Clone
where
    B: axum::body::HttpBody<Data = bytes::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    tower::service_fn(move |request: Request<B>| {
        let router = router.clone();
        async move {
            let method = request.method().clone();
            let uri = request.uri().clone();

            match tokio::time::timeout(write_timeout, router.oneshot(request.map(Body::new))).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(infallible)) => match infallible {},
                Err(_) => {
                    tracing::warn!(
                        method = %method,
                        uri = %uri,
                        write_timeout = ?write_timeout,
                        "Write deadline exceeded, closing connection without a response"
                    );
                    Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "write deadline exceeded",
                    ))
                }
            }
        }
    })
}
