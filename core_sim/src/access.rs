use rand::Rng;
use thiserror::Error;

use crate::{
    common::{Cell, Value},
    memory::MemoryStore,
};

pub const DEFAULT_ACCESS_COUNT: usize = 30;

/// The trace to replay: values copied from memory cells at generation
/// time. Holds values, not addresses; duplicates are expected.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct AccessSequence {
    inner: Vec<Value>,
}

impl AccessSequence {
    /// Draws `count` cells uniformly with replacement and records their
    /// current values.
    pub fn generate(count: usize, memory: &MemoryStore, rng: &mut impl Rng) -> Self {
        let mut inner = Vec::with_capacity(count);
        for _ in 0..count {
            let cell = Cell::new(
                rng.gen_range(0..memory.rows()),
                rng.gen_range(0..memory.cols()),
            );
            inner.push(memory.value_at(cell));
        }
        log::debug!("generated access sequence of {count} values");
        Self { inner }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { inner: values }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.get(index).copied()
    }

    pub fn values(&self) -> &[Value] {
        &self.inner
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderError {
    #[error("traversal index {index} out of range for an access sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Replay order over an access sequence: a subset or permutation of its
/// positions. The same position may be scheduled more than once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversalOrder {
    inner: Vec<usize>,
}

impl TraversalOrder {
    /// Validates every index against the sequence length the order was
    /// built for.
    pub fn new(indices: Vec<usize>, len: usize) -> Result<Self, OrderError> {
        for &index in &indices {
            if index >= len {
                return Err(OrderError::IndexOutOfRange { index, len });
            }
        }
        Ok(Self { inner: indices })
    }

    /// Default order: every position once, in sequence order.
    pub fn identity(len: usize) -> Self {
        Self {
            inner: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<usize> {
        self.inner.get(position).copied()
    }

    pub fn indices(&self) -> &[usize] {
        &self.inner
    }
}
