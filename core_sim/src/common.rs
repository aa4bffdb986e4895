use std::fmt;

/// Stored values are decimal, three digits wide when rendered.
pub const VALUE_LIMIT: Value = 1000;

pub type Value = u16;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
/// to unify displaying a position within the memory grid
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Where a lookup located its value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Location {
    CacheSlot(usize),
    MemoryCell(Cell),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::CacheSlot(slot) => write!(f, "cache slot {slot}"),
            Location::MemoryCell(cell) => write!(f, "memory cell {cell}"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutcomeKind {
    Hit,
    Miss,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Hit => write!(f, "hit"),
            OutcomeKind::Miss => write!(f, "miss"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub location: Location,
    /// Set only when a miss filled an already-full cache.
    pub evicted: Option<Value>,
}

impl Outcome {
    pub fn is_hit(&self) -> bool {
        matches!(self.kind, OutcomeKind::Hit)
    }
}
