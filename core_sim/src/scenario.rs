use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    access::{AccessSequence, OrderError, TraversalOrder},
    common::{Value, VALUE_LIMIT},
    memory::MemoryStore,
    sim::Session,
};

/// A complete run setup on disk: grid, cache capacity, trace and an
/// optional replay order. Lets a run be replayed exactly, without RNG.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub cache_capacity: usize,
    /// Row-major grid; every row must have the same width.
    pub memory: Vec<Vec<Value>>,
    pub accesses: Vec<Value>,
    /// Positions into `accesses`; identity order when omitted.
    #[serde(default)]
    pub order: Option<Vec<usize>>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("memory grid is empty")]
    EmptyGrid,
    #[error("memory row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("value {value} exceeds the three-digit limit")]
    ValueOutOfRange { value: Value },
    #[error("cache capacity must be non-zero")]
    ZeroCapacity,
    #[error("access list is empty")]
    NoAccesses,
    #[error("access #{index} ({value:03}) does not occur in the memory grid")]
    AccessNotInMemory { index: usize, value: Value },
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl Scenario {
    pub fn deser(file: impl std::io::Read) -> Result<Scenario> {
        Ok(serde_json::from_reader(file)?)
    }

    /// Checks shape and range, and re-establishes the core invariant that
    /// every access value occurs somewhere in the grid.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.cache_capacity == 0 {
            return Err(ScenarioError::ZeroCapacity);
        }
        let cols = self.memory.first().map(Vec::len).unwrap_or(0);
        if cols == 0 {
            return Err(ScenarioError::EmptyGrid);
        }
        for (row, cells) in self.memory.iter().enumerate() {
            if cells.len() != cols {
                return Err(ScenarioError::RaggedRow {
                    row,
                    expected: cols,
                    got: cells.len(),
                });
            }
            for &value in cells {
                if value >= VALUE_LIMIT {
                    return Err(ScenarioError::ValueOutOfRange { value });
                }
            }
        }
        if self.accesses.is_empty() {
            return Err(ScenarioError::NoAccesses);
        }
        for (index, &value) in self.accesses.iter().enumerate() {
            if !self.memory.iter().any(|row| row.contains(&value)) {
                return Err(ScenarioError::AccessNotInMemory { index, value });
            }
        }
        if let Some(order) = &self.order {
            // surfaced early so a bad file fails at load, not mid-run
            TraversalOrder::new(order.clone(), self.accesses.len())?;
        }
        Ok(())
    }

    /// Builds the session and the traversal order the run should use.
    pub fn into_session(self) -> Result<(Session, TraversalOrder), ScenarioError> {
        self.validate()?;
        let rows = self.memory.len();
        let cols = self.memory[0].len();
        let cells: Vec<Value> = self.memory.into_iter().flatten().collect();
        let order = match self.order {
            Some(indices) => TraversalOrder::new(indices, self.accesses.len())?,
            None => TraversalOrder::identity(self.accesses.len()),
        };
        let session = Session::with_accesses(
            MemoryStore::from_raw(rows, cols, cells),
            self.cache_capacity,
            AccessSequence::from_values(self.accesses),
        );
        Ok((session, order))
    }
}
