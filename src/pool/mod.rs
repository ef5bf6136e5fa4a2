//! Object pooling subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline.acquire()
//!     → object_pool.rs (pop idle instance or build a default one, reset it)
//!     → Pooled<T> guard handed to the request
//!     → guard dropped on any exit path → instance pushed back (or discarded)
//! ```
//!
//! # Design Decisions
//! - Lock-free bounded idle set; acquire never blocks and never fails
//! - Release happens in `Drop`, so it runs exactly once per acquisition
//! - Oversized instances are discarded instead of pinning memory

pub mod object_pool;

pub use object_pool::{Pool, PoolStats, Poolable, Pooled};
