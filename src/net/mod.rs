//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept concurrency prevents resource exhaustion
//! - Connection slots are RAII permits

pub mod listener;

pub use listener::{ConnectionPermit, Listener, ListenerError};
