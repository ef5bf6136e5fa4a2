//! Generic reuse pool backed by a bounded lock-free queue.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;

use crate::observability::metrics;

/// A value that can live in a [`Pool`].
pub trait Poolable: Default + Send + 'static {
    /// Clear any state left over from a previous request.
    fn reset(&mut self);

    /// Heap footprint used to decide whether the value is worth keeping.
    fn retained_size(&self) -> usize {
        0
    }
}

impl Poolable for BytesMut {
    fn reset(&mut self) {
        self.clear();
    }

    fn retained_size(&self) -> usize {
        self.capacity()
    }
}

/// Counters describing pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Instances built because no idle one was available.
    pub created: u64,
    pub acquired: u64,
    pub released: u64,
}

impl PoolStats {
    /// Acquisitions not yet released.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Shared pool of reusable `T` instances.
pub struct Pool<T> {
    name: &'static str,
    idle: ArrayQueue<T>,
    max_retained_size: usize,
    created: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool keeping at most `capacity` idle instances.
    ///
    /// `capacity` must be non-zero; config validation guarantees it.
    pub fn new(name: &'static str, capacity: usize, max_retained_size: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            idle: ArrayQueue::new(capacity.max(1)),
            max_retained_size,
            created: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Take an instance out of the pool. The instance is always reset.
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let mut item = match self.idle.pop() {
            Some(item) => item,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                metrics::record_pool_allocation(self.name);
                T::default()
            }
        };
        item.reset();
        self.acquired.fetch_add(1, Ordering::Relaxed);

        Pooled {
            item: Some(item),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, item: T) {
        self.released.fetch_add(1, Ordering::Release);

        if item.retained_size() > self.max_retained_size {
            tracing::trace!(pool = self.name, size = item.retained_size(), "Discarding oversized instance");
            return;
        }
        if self.idle.push(item).is_err() {
            tracing::trace!(pool = self.name, "Idle set full, dropping instance");
        }
    }

    /// Snapshot of the counters.
    ///
    /// `released` is read first, so a snapshot never shows more releases than
    /// acquisitions.
    pub fn stats(&self) -> PoolStats {
        let released = self.released.load(Ordering::Acquire);
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released,
        }
    }

    /// Number of instances currently idle.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("idle", &self.idle.len())
            .field("capacity", &self.idle.capacity())
            .finish()
    }
}

/// A RAII guard over a pooled instance.
///
/// When dropped, the instance goes back to its pool. This also happens while
/// unwinding, so a panicking request cannot leak pooled objects.
pub struct Pooled<T: Poolable> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `None` after drop has run.
        self.item.as_ref().unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}
