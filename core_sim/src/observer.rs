use crate::common::{Cell, OutcomeKind, Value};

/// Notification contract between the step driver and a presentation
/// shell. Every method defaults to a no-op so headless callers can pass
/// [`NullObserver`].
///
/// Notifications for a step are delivered before the next step begins;
/// the driver never calls back concurrently.
pub trait Observer {
    /// A new run is starting; stale highlights belong to the previous run.
    fn on_reset(&mut self) {}

    /// One cache-phase scan step. `candidate` is `None` for a slot that
    /// holds no resident yet.
    fn on_cache_step(&mut self, _slot: usize, _candidate: Option<Value>, _is_hit: bool) {}

    /// One memory-phase scan step over the row-major flattening.
    fn on_memory_step(&mut self, _cell: Cell, _candidate: Value, _is_hit: bool) {}

    /// The cache mutated: `residents` is the new slot order, `evicted`
    /// the entry that was pushed out, if any.
    fn on_cache_updated(&mut self, _residents: &[Value], _evicted: Option<Value>) {}

    /// The access at `index` (a position in the access sequence, not in
    /// the traversal order) resolved.
    fn on_access_resolved(&mut self, _index: usize, _kind: OutcomeKind) {}

    /// The run reached the end of its traversal order or aborted.
    fn on_run_halted(&mut self) {}
}

pub struct NullObserver;

impl Observer for NullObserver {}
