//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use flate2::read::GzDecoder;
use tower::ServiceExt;

use library_api::api::{ApiRequest, Handler, HandlerResult, RequestContext};
use library_api::{HttpServer, ServerConfig};

/// Handler backed by a plain closure.
pub struct ScriptedHandler<F> {
    script: F,
}

#[async_trait]
impl<F> Handler for ScriptedHandler<F>
where
    F: Fn(&ApiRequest) -> HandlerResult + Send + Sync + 'static,
{
    async fn handle(&self, _ctx: &RequestContext, request: &ApiRequest) -> HandlerResult {
        (self.script)(request)
    }
}

pub fn scripted<F>(script: F) -> Arc<dyn Handler>
where
    F: Fn(&ApiRequest) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(ScriptedHandler { script })
}

/// Server with default config around a scripted handler.
pub fn server<F>(script: F) -> HttpServer
where
    F: Fn(&ApiRequest) -> HandlerResult + Send + Sync + 'static,
{
    HttpServer::new(ServerConfig::default(), scripted(script))
}

/// Drive one request through the router in-process.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}
