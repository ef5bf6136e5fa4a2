//! Default handler shipped with the binary.
//!
//! Reflects the request back to the caller. Useful as a smoke test of the
//! pipeline and as a template for real handlers.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::api::error::{ErrorCode, ErrorKind, ServerError};
use crate::api::handler::{Handler, HandlerResult, Payload};
use crate::api::request::{ApiRequest, RequestContext};

#[derive(Debug, Clone)]
pub struct EchoHandler {
    service: String,
}

#[derive(Serialize)]
struct EchoReply<'a> {
    service: &'a str,
    request_id: &'a str,
    method: &'a str,
    path: &'a str,
    query: Option<&'a str>,
    authenticated: bool,
    body: Value,
}

impl EchoHandler {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }
}

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, ctx: &RequestContext, request: &ApiRequest) -> HandlerResult {
        let body = if request.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_reader(request.body_reader()).map_err(|e| {
                ServerError::wrap("invalid JSON body", ErrorCode::InvalidJsonBody, ErrorKind::BadRequest, Some(&e))
            })?
        };

        Payload::json(&EchoReply {
            service: &self.service,
            request_id: ctx.request_id(),
            method: request.method().as_str(),
            path: request.target().path(),
            query: request.target().query(),
            authenticated: !request.authorization().is_empty(),
            body,
        })
    }
}
