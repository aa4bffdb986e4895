use rand::Rng;

use crate::common::{Cell, Value, VALUE_LIMIT};

pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_COLS: usize = 20;

/// Backing store: a fixed R×C grid of values, row-major.
///
/// Dimensions are fixed at construction. Values change only through
/// [`MemoryStore::fill`] or by constructing from explicit cells; lookups
/// never write to the grid.
#[derive(Clone)]
pub struct MemoryStore {
    rows: usize,
    cols: usize,
    inner: Vec<Value>,
}

impl MemoryStore {
    /// Zero-filled grid. Panics on a zero dimension, which is a
    /// configuration bug rather than a runtime condition.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "memory grid must be non-empty");
        Self {
            rows,
            cols,
            inner: vec![0; rows * cols],
        }
    }

    /// Grid from pre-validated row-major cells. Callers (the scenario
    /// loader) check shape and value range beforehand.
    pub fn from_raw(rows: usize, cols: usize, cells: Vec<Value>) -> Self {
        assert!(rows > 0 && cols > 0, "memory grid must be non-empty");
        assert_eq!(cells.len(), rows * cols, "cell count must match grid shape");
        Self {
            rows,
            cols,
            inner: cells,
        }
    }

    /// Regenerates every cell with a uniform value in `0..VALUE_LIMIT`.
    pub fn fill(&mut self, rng: &mut impl Rng) {
        for cell in self.inner.iter_mut() {
            *cell = rng.gen_range(0..VALUE_LIMIT);
        }
        log::debug!("memory refilled ({}x{})", self.rows, self.cols);
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells, also the length of the row-major scan.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Out-of-range cells are a programming error, hence the indexing panic.
    pub fn value_at(&self, cell: Cell) -> Value {
        assert!(cell.row < self.rows && cell.col < self.cols);
        self.inner[cell.row * self.cols + cell.col]
    }

    /// Value at a row-major linear index.
    pub fn value_at_linear(&self, linear: usize) -> Value {
        self.inner[linear]
    }

    /// Maps a row-major linear index back to its grid position.
    pub fn cell_at(&self, linear: usize) -> Cell {
        Cell::new(linear / self.cols, linear % self.cols)
    }

    /// First cell holding `value` in row-major order, if any.
    pub fn find(&self, value: Value) -> Option<Cell> {
        self.inner
            .iter()
            .position(|&v| v == value)
            .map(|linear| self.cell_at(linear))
    }

    pub fn row(&self, row: usize) -> &[Value] {
        &self.inner[row * self.cols..(row + 1) * self.cols]
    }
}
