use std::collections::VecDeque;

use crate::common::Value;

pub const DEFAULT_CAPACITY: usize = 8;

/// Bounded FIFO of resident values. The longest-resident entry sits at
/// slot 0 and is the eviction victim when the cache is full.
pub struct CacheState {
    capacity: usize,
    inner: VecDeque<Value>,
}

impl CacheState {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            capacity,
            inner: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Resident value at `slot`, or `None` for a slot not yet filled.
    pub fn value_at(&self, slot: usize) -> Option<Value> {
        self.inner.get(slot).copied()
    }

    /// Lowest slot holding `value`. First match in scan order wins.
    pub fn find(&self, value: Value) -> Option<usize> {
        self.inner.iter().position(|&v| v == value)
    }

    /// Insert-with-eviction: appends `value` as the newest resident and
    /// returns the evicted oldest entry when the cache was full. The only
    /// mutation path besides [`CacheState::clear`].
    pub fn insert(&mut self, value: Value) -> Option<Value> {
        let evicted = if self.inner.len() == self.capacity {
            self.inner.pop_front()
        } else {
            None
        };
        self.inner.push_back(value);
        debug_assert!(self.inner.len() <= self.capacity);
        evicted
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Snapshot of residents in slot order, for notifications.
    pub fn residents(&self) -> Vec<Value> {
        self.inner.iter().copied().collect()
    }
}
