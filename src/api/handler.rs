//! Handler contract and payload type.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::api::error::{ErrorCode, ErrorEnvelope, ErrorKind, HandlerError, ServerError};
use crate::api::request::{ApiRequest, RequestContext};

/// What a handler returns. `Ok(None)` means "success, no body".
pub type HandlerResult = Result<Option<Payload>, HandlerError>;

/// Application logic behind the endpoint.
///
/// Method and sub-path dispatch is entirely the handler's business.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, ctx: &RequestContext, request: &ApiRequest) -> HandlerResult;
}

/// A response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Serialized as JSON.
    Json(Value),
    /// Written verbatim.
    Raw(Bytes),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> HandlerResult {
        match serde_json::to_value(value) {
            Ok(value) => Ok(Some(Payload::Json(value))),
            Err(e) => Err(ServerError::wrap(
                "unable to serialize response",
                ErrorCode::Internal,
                ErrorKind::Internal,
                Some(&e),
            )
            .into()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl TryFrom<&ErrorEnvelope> for Payload {
    type Error = serde_json::Error;

    fn try_from(envelope: &ErrorEnvelope) -> Result<Self, Self::Error> {
        serde_json::to_value(envelope).map(Payload::Json)
    }
}
