//! API endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request (mounted prefix)
//!     → pipeline.rs (buffer body, pooled ApiRequest)
//!     → handler.rs (application Handler, opaque)
//!     → error.rs (classify error, map kind → status)
//!     → encoder.rs (JSON, gzip on success)
//!     → HTTP response
//! ```

pub mod echo;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod request;

pub use echo::EchoHandler;
pub use encoder::ResponseEncoder;
pub use error::{classify, Classification, ErrorCode, ErrorEnvelope, ErrorKind, HandlerError, ServerError};
pub use handler::{Handler, HandlerResult, Payload};
pub use pipeline::{ApiState, JSON_CONTENT_TYPE};
pub use request::{ApiRequest, RequestContext};
