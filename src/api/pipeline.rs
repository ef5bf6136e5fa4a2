//! The request lifecycle for the API endpoint.
//!
//! # Flow
//! ```text
//! Received        capture Authorization, method, target
//! BodyBuffered    drain the body into a pooled buffer
//! HandlerInvoked  populate a pooled ApiRequest, call the handler once
//! Classified      success → 200 + payload, error → taxonomy status (+ envelope)
//! Encoded         JSON, gzip only on success
//! Written         status, headers, body
//! Released        pooled objects returned, access log emitted
//! ```
//!
//! # Design Decisions
//! - Pooled objects are RAII guards; release cannot be skipped
//! - The access log is emitted from `Drop`, so it runs on every exit path
//! - Handler panics become unclassified errors instead of tearing down the connection
//! - The handler is never cancelled; it runs detached from the connection
//! - Error bodies are never compressed

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Method, Request, StatusCode, Uri,
    },
    response::Response,
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::{FutureExt, StreamExt};

use crate::api::encoder::ResponseEncoder;
use crate::api::error::{classify, ErrorCode, ErrorKind, HandlerError, ServerError};
use crate::api::handler::{Handler, HandlerResult, Payload};
use crate::api::request::{ApiRequest, RequestContext};
use crate::config::PoolConfig;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::pool::Pool;

/// Content type of every response body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Shared state of the endpoint: the handler and the two pools.
#[derive(Clone)]
pub struct ApiState {
    handler: Arc<dyn Handler>,
    requests: Arc<Pool<ApiRequest>>,
    buffers: Arc<Pool<BytesMut>>,
    encoder: ResponseEncoder,
}

impl ApiState {
    pub fn new(handler: Arc<dyn Handler>, pool: &PoolConfig, encoder: ResponseEncoder) -> Self {
        Self {
            handler,
            requests: Pool::new("request", pool.request_capacity, usize::MAX),
            buffers: Pool::new("buffer", pool.buffer_capacity, pool.max_retained_buffer_bytes),
            encoder,
        }
    }

    pub fn request_pool(&self) -> &Arc<Pool<ApiRequest>> {
        &self.requests
    }

    pub fn buffer_pool(&self) -> &Arc<Pool<BytesMut>> {
        &self.buffers
    }

    /// Run one HTTP request through the pipeline.
    pub async fn process(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        // Declared first so it drops last, after every pooled guard.
        let mut log = AccessLog::start(&parts.method, &parts.uri, &request_id);
        let ctx = RequestContext::new(request_id);

        let result = match self.buffer_body(body).await {
            Ok((body, text)) => {
                log.request_body = text;
                self.invoke(&ctx, &authorization, body, parts.uri.clone(), parts.method.clone())
                    .await
            }
            Err(err) => Err(err.into()),
        };

        let (status, payload, compress) = resolve(result);
        self.render(status, payload.as_ref(), compress, &mut log)
    }

    async fn buffer_body(&self, body: Body) -> Result<(Bytes, String), ServerError> {
        let mut scratch = self.buffers.acquire();
        let mut stream = body.into_data_stream();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => scratch.extend_from_slice(&chunk),
                Err(e) => {
                    return Err(ServerError::wrap(
                        "unable to read request body",
                        ErrorCode::InvalidJsonBody,
                        ErrorKind::BadRequest,
                        Some(&e),
                    ));
                }
            }
        }

        let text = String::from_utf8_lossy(&scratch).into_owned();
        Ok((Bytes::copy_from_slice(&scratch), text))
    }

    async fn invoke(
        &self,
        ctx: &RequestContext,
        authorization: &str,
        body: Bytes,
        target: Uri,
        method: Method,
    ) -> HandlerResult {
        let mut request = self.requests.acquire();
        request.populate(authorization, body, target, method);

        let call = AssertUnwindSafe(self.handler.handle(ctx, &request))
            .catch_unwind()
            .await;

        match call {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(request_id = %ctx.request_id(), panic = %message, "Handler panicked");
                Err(HandlerError::unclassified(format!("handler panicked: {message}")))
            }
        }
    }

    fn render(
        &self,
        status: StatusCode,
        payload: Option<&Payload>,
        compress: bool,
        log: &mut AccessLog,
    ) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;

        if let Some(payload) = payload {
            let mut wire = self.buffers.acquire();
            let mut canonical = self.buffers.acquire();

            match self.encoder.encode(Some(payload), compress, &mut wire, &mut canonical) {
                Ok(text) => {
                    let headers = response.headers_mut();
                    if compress {
                        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                    }
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(wire.len()));
                    *response.body_mut() = Body::from(Bytes::copy_from_slice(&wire));
                    log.response_body = Some(text);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode response");
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
        }

        log.status = response.status();
        response
    }
}

/// Axum entry point for the mounted endpoint.
///
/// The pipeline runs on its own task, so a closed connection or a missed
/// write deadline never cancels the handler.
pub async fn api_handler(State(state): State<ApiState>, request: Request<Body>) -> Response {
    match tokio::spawn(async move { state.process(request).await }).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline task failed");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

/// Turn the handler's outcome into status, body and compression choice.
fn resolve(result: HandlerResult) -> (StatusCode, Option<Payload>, bool) {
    match result {
        Ok(payload) => (StatusCode::OK, payload, true),
        Err(err) => {
            let classification = classify(&err);
            if let HandlerError::Unclassified(e) = &err {
                tracing::warn!(error = %e, "Handler returned an unclassified error");
            }
            let payload = classification.envelope().and_then(|envelope| {
                Payload::try_from(&envelope)
                    .map_err(|e| tracing::error!(error = %e, "Failed to serialize error envelope"))
                    .ok()
            });
            (classification.status(), payload, false)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Per-request log record, flushed when dropped.
struct AccessLog {
    started: Instant,
    started_at: DateTime<Utc>,
    method: Method,
    uri: Uri,
    request_id: String,
    status: StatusCode,
    request_body: String,
    response_body: Option<String>,
}

impl AccessLog {
    fn start(method: &Method, uri: &Uri, request_id: &str) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            method: method.clone(),
            uri: uri.clone(),
            request_id: request_id.to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            request_body: String::new(),
            response_body: None,
        }
    }
}

impl Drop for AccessLog {
    fn drop(&mut self) {
        let duration = self.started.elapsed();

        tracing::info!(
            started_at = %self.started_at.to_rfc3339(),
            status = self.status.as_u16(),
            method = %self.method,
            uri = %self.uri,
            duration = ?duration,
            request_id = %self.request_id,
            "Request completed"
        );
        tracing::info!(request_id = %self.request_id, "request={}", self.request_body);
        if let Some(body) = &self.response_body {
            tracing::info!(request_id = %self.request_id, "response={}", body);
        }

        metrics::record_request(self.method.as_str(), self.status.as_u16(), duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_success_is_compressed() {
        let (status, payload, compress) = resolve(Ok(Some(Payload::Json(json!({"ok": true})))));
        assert_eq!(status, StatusCode::OK);
        assert!(payload.is_some());
        assert!(compress);
    }

    #[test]
    fn test_resolve_empty_success() {
        let (status, payload, _) = resolve(Ok(None));
        assert_eq!(status, StatusCode::OK);
        assert!(payload.is_none());
    }

    #[test]
    fn test_resolve_structured_error() {
        let err = ServerError::wrap("no such book", ErrorCode::EntityNotFound, ErrorKind::ResourceNotFound, None);
        let (status, payload, compress) = resolve(Err(err.into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!compress);
        assert_eq!(
            payload,
            Some(Payload::Json(json!({"ErrorCode": 404, "Cause": "no such book"})))
        );
    }

    #[test]
    fn test_resolve_unclassified_error_has_no_body() {
        let (status, payload, compress) = resolve(Err(HandlerError::unclassified("boom")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(payload.is_none());
        assert!(!compress);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Fixed(fn() -> HandlerResult);

    #[async_trait::async_trait]
    impl Handler for Fixed {
        async fn handle(&self, _ctx: &RequestContext, _request: &ApiRequest) -> HandlerResult {
            (self.0)()
        }
    }

    /// Run one request and return every log line it produced.
    async fn logged_lines(result: fn() -> HandlerResult, body: &'static str) -> Vec<String> {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let state = ApiState::new(Arc::new(Fixed(result)), &PoolConfig::default(), ResponseEncoder::default());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/books?id=7")
            .body(Body::from(body))
            .unwrap();
        state.process(request).await;

        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).lines().map(str::to_owned).collect()
    }

    fn position(lines: &[String], needle: &str) -> usize {
        lines
            .iter()
            .position(|line| line.contains(needle))
            .unwrap_or_else(|| panic!("no line containing {needle:?} in {lines:#?}"))
    }

    #[tokio::test]
    async fn test_access_log_lines_in_order() {
        let lines = logged_lines(|| Ok(Some(Payload::Json(json!({"ok": true})))), r#"{"title":"Dune"}"#).await;

        let summary = position(&lines, "Request completed");
        let request = position(&lines, r#"request={"title":"Dune"}"#);
        let response = position(&lines, r#"response={"ok":true}"#);
        assert!(summary < request && request < response, "{lines:#?}");

        let line = &lines[summary];
        for field in ["started_at=", "status=200", "method=POST", "uri=/api/books?id=7", "duration=", "request_id="] {
            assert!(line.contains(field), "missing {field} in {line}");
        }
    }

    #[tokio::test]
    async fn test_access_log_error_envelope_is_logged_as_response() {
        let lines = logged_lines(
            || Err(ServerError::wrap("bad id", ErrorCode::Validation, ErrorKind::BadRequest, None).into()),
            "",
        )
        .await;

        assert!(lines[position(&lines, "Request completed")].contains("status=400"));
        position(&lines, "request=");
        position(&lines, r#"response={"ErrorCode":500,"Cause":"bad id"}"#);
    }

    #[tokio::test]
    async fn test_access_log_omits_response_without_body() {
        let lines = logged_lines(|| Ok(None), "{}").await;
        assert!(lines[position(&lines, "Request completed")].contains("status=200"));
        position(&lines, "request={}");
        assert!(!lines.iter().any(|l| l.contains("response=")), "{lines:#?}");

        let lines = logged_lines(|| Err(HandlerError::unclassified("boom")), "{}").await;
        assert!(lines[position(&lines, "Request completed")].contains("status=500"));
        position(&lines, "request={}");
        assert!(!lines.iter().any(|l| l.contains("response=")), "{lines:#?}");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
