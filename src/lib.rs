//! Single-endpoint HTTP API front end.
//!
//! Requests under one mount prefix are buffered, handed to an application
//! [`api::Handler`], and the result (or mapped error) is written back as JSON,
//! gzip-compressed on success.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;

pub use api::{Handler, HandlerError, Payload, ServerError};
pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
