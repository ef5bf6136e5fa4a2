//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper connection, request id, tracing, write timeout)
//!     → mount point → api::pipeline
//!     → Send to client
//! ```

pub mod server;

pub use server::HttpServer;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";
