//! Incoming request as seen by the handler.
//!
//! Instances are pooled: the pipeline acquires one per HTTP request, assigns
//! every field with [`ApiRequest::populate`], and releases it once the handler
//! returns.

use std::time::Instant;

use axum::http::{Method, Uri};
use bytes::Bytes;

use crate::pool::Poolable;

/// The request handed to a [`Handler`](crate::api::Handler).
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    authorization: String,
    body: Bytes,
    target: Uri,
    method: Method,
}

impl ApiRequest {
    pub fn new(authorization: &str, body: Bytes, target: Uri, method: Method) -> Self {
        let mut request = Self::default();
        request.populate(authorization, body, target, method);
        request
    }

    /// Overwrite all four fields. Reuses the authorization allocation.
    pub(crate) fn populate(&mut self, authorization: &str, body: Bytes, target: Uri, method: Method) {
        self.authorization.clear();
        self.authorization.push_str(authorization);
        self.body = body;
        self.target = target;
        self.method = method;
    }

    /// Raw `Authorization` header, empty when absent. Not validated.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A fresh reader over the buffered body. Can be called any number of times.
    pub fn body_reader(&self) -> impl std::io::Read + '_ {
        self.body.as_ref()
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Poolable for ApiRequest {
    fn reset(&mut self) {
        self.authorization.clear();
        self.body = Bytes::new();
        self.target = Uri::default();
        self.method = Method::default();
    }
}

/// Per-request context passed to the handler.
///
/// Carries no deadline and no cancellation signal; a handler that needs a
/// bound must impose it itself.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    received_at: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            received_at: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}
