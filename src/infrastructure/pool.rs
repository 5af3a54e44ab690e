//! Leaky-bucket object pooling
//!
//! Reusable-buffer cache with degrade-don't-block semantics on both sides:
//! an empty pool allocates fresh instead of blocking the caller, a full pool
//! drops the returned object instead of blocking the producer. The pool is a
//! throughput optimization, never a correctness dependency.
//!
//! Uses crossbeam-queue for lock-free acquire/release.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generic leaky-bucket pool
///
/// # Type Parameters
/// - `T`: The type of object to pool. Must be Send for thread safety.
///
/// # Example
/// ```
/// use workq::ObjectPool;
///
/// let pool = ObjectPool::with_capacity(64, || vec![0u8; 1024]);
///
/// // Never blocks: pool hit or fresh allocation
/// let buf = pool.acquire();
///
/// // Never blocks: returned to the free list, or dropped if it is full
/// pool.release(buf);
/// ```
pub struct ObjectPool<T: Send> {
    free_list: Option<ArrayQueue<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    hits: AtomicU64,
    misses: AtomicU64,
    discards: AtomicU64,
}

impl<T: Send> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("discards", &self.discards)
            .finish_non_exhaustive()
    }
}

impl<T: Send> ObjectPool<T> {
    /// Create a pool with the given free-list capacity
    ///
    /// A capacity of zero disables pooling entirely: every `acquire`
    /// allocates fresh and every `release` discards.
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            free_list: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            factory: Box::new(factory),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discards: AtomicU64::new(0),
        }
    }

    /// Take an object from the pool, allocating fresh if it is empty
    ///
    /// Never blocks. The returned object is exclusively owned by the caller
    /// until released.
    #[inline]
    pub fn acquire(&self) -> T {
        match self.free_list.as_ref().and_then(|q| q.pop()) {
            Some(obj) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                obj
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        }
    }

    /// Return an object to the pool
    ///
    /// Never blocks: if the free list is saturated the object is silently
    /// dropped and reclaimed by normal memory management.
    #[inline]
    pub fn release(&self, obj: T) {
        match self.free_list.as_ref().map(|q| q.push(obj)) {
            Some(Ok(())) => {}
            _ => {
                self.discards.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of objects currently waiting in the free list
    #[inline]
    pub fn len(&self) -> usize {
        self.free_list.as_ref().map_or(0, |q| q.len())
    }

    /// Check if the free list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free-list capacity (zero means pooling is disabled)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.free_list.as_ref().map_or(0, |q| q.capacity())
    }

    /// Acquires served from the free list
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Acquires that fell back to fresh allocation
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Releases dropped because the free list was saturated
    #[inline]
    pub fn discards(&self) -> u64 {
        self.discards.load(Ordering::Relaxed)
    }
}

/// Specialized pool for byte buffers (Vec<u8>)
pub type BufferPool = ObjectPool<Vec<u8>>;

impl BufferPool {
    /// Create a byte-buffer pool; buffers carry `buffer_size` capacity
    pub fn with_buffer_size(pool_capacity: usize, buffer_size: usize) -> Self {
        Self::with_capacity(pool_capacity, move || Vec::with_capacity(buffer_size))
    }

    /// Return a buffer after clearing it, so reuse never leaks payload bytes
    #[inline]
    pub fn release_cleared(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.release(buf);
    }
}
