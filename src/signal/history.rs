use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Fixed-capacity FIFO: pushing past capacity evicts the oldest samples.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        self.buffer.push_back(value);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    /// Most recent sample, or `None` before the first push.
    pub fn latest(&self) -> Option<T> {
        self.buffer.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }
}

/// A [`BoundedHistory`] behind a lock, cloned into every loop that touches it.
///
/// Exactly one loop (the sampler) pushes; everyone else only reads.
#[derive(Debug)]
pub struct SharedHistory<T> {
    inner: Arc<RwLock<BoundedHistory<T>>>,
}

impl<T> Clone for SharedHistory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> SharedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BoundedHistory::new(capacity))),
        }
    }

    pub fn push(&self, value: T) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    pub fn latest(&self) -> Option<T> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }
}

/// Lock-free "latest value" slot for a single `f64` stream.
///
/// Empty is encoded as NaN, so NaN itself cannot be published.
#[derive(Debug, Clone)]
pub struct LatestCell {
    bits: Arc<AtomicU64>,
}

impl Default for LatestCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestCell {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(f64::NAN.to_bits())),
        }
    }

    pub fn publish(&self, value: f64) {
        debug_assert!(!value.is_nan());
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn latest(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        (!value.is_nan()).then_some(value)
    }
}
