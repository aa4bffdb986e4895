use std::fmt;

use rand::Rng;
use thiserror::Error;

use crate::{
    access::{AccessSequence, TraversalOrder},
    cache::CacheState,
    common::{Location, Outcome, OutcomeKind, Value},
    memory::MemoryStore,
    observer::Observer,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// Rejected synchronously; the session is left untouched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("cannot {what} while a run is in progress")]
    MutateWhileRunning { what: &'static str },
    #[error("traversal order is empty; nothing to replay")]
    EmptyTraversalOrder,
    #[error("no access sequence has been generated")]
    NoAccessSequence,
    #[error("traversal index {index} out of range for an access sequence of length {len}")]
    OrderIndexOutOfRange { index: usize, len: usize },
}

/// The one fatal condition of the model: the memory phase ran off the end
/// of the grid. Every access value was sampled from the store, so this
/// means the store was refilled after the sequence was generated.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("value {value:03} is absent from main memory; the access sequence no longer matches the store")]
    ValueNotInMemory { value: Value },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    ScanningCache,
    ScanningMemory,
    Halted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::ScanningCache => write!(f, "scanning cache"),
            Phase::ScanningMemory => write!(f, "scanning memory"),
            Phase::Halted => write!(f, "halted"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ControlFlow {
    Running,
    Halted,
}

impl ControlFlow {
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }
}

/// Transient per-run state. Reset wholesale by `start`, discarded on halt.
struct RunState {
    order: TraversalOrder,
    /// Position within the traversal order.
    position: usize,
    /// Index into the access sequence for the current position.
    access_index: usize,
    /// Value being looked up.
    value: Value,
    /// Cache slot or row-major memory index, depending on phase.
    cursor: usize,
    phase: Phase,
    running: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            order: TraversalOrder::identity(0),
            position: 0,
            access_index: 0,
            value: 0,
            cursor: 0,
            phase: Phase::Idle,
            running: false,
        }
    }
}

/// One simulation session: the memory store and cache it owns, the access
/// sequence to replay, and the step driver that advances a run one
/// observable scan step per [`Session::tick`].
///
/// Ticks are paced externally; the session itself never sleeps or blocks.
pub struct Session {
    memory: MemoryStore,
    cache: CacheState,
    accesses: AccessSequence,
    run: RunState,
    #[cfg(feature = "stat")]
    stat_builder: stat::SessionStatBuilder,
}

impl Session {
    pub fn new(memory: MemoryStore, cache_capacity: usize) -> Self {
        Self {
            memory,
            cache: CacheState::new(cache_capacity),
            accesses: AccessSequence::default(),
            run: RunState::default(),
            #[cfg(feature = "stat")]
            stat_builder: stat::SessionStatBuilder::new(),
        }
    }

    pub fn with_accesses(
        memory: MemoryStore,
        cache_capacity: usize,
        accesses: AccessSequence,
    ) -> Self {
        let mut s = Self::new(memory, cache_capacity);
        s.accesses = accesses;
        s
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    pub fn accesses(&self) -> &AccessSequence {
        &self.accesses
    }

    pub fn phase(&self) -> Phase {
        self.run.phase
    }

    pub fn is_running(&self) -> bool {
        self.run.running
    }

    fn ensure_not_running(&self, what: &'static str) -> Result<(), PreconditionError> {
        if self.run.running {
            Err(PreconditionError::MutateWhileRunning { what })
        } else {
            Ok(())
        }
    }

    /// Regenerates every memory cell. A previously generated access
    /// sequence may no longer match the store afterwards.
    pub fn fill(&mut self, rng: &mut impl Rng) -> Result<(), PreconditionError> {
        self.ensure_not_running("refill memory")?;
        self.memory.fill(rng);
        if !self.accesses.is_empty() {
            log::warn!("memory refilled; the existing access sequence is now stale");
        }
        Ok(())
    }

    /// Replaces the access sequence with `count` fresh draws from memory.
    pub fn generate(&mut self, count: usize, rng: &mut impl Rng) -> Result<(), PreconditionError> {
        self.ensure_not_running("generate an access sequence")?;
        self.accesses = AccessSequence::generate(count, &self.memory, rng);
        Ok(())
    }

    pub fn set_accesses(&mut self, accesses: AccessSequence) -> Result<(), PreconditionError> {
        self.ensure_not_running("replace the access sequence")?;
        self.accesses = accesses;
        Ok(())
    }

    pub fn clear_cache(&mut self) -> Result<(), PreconditionError> {
        self.ensure_not_running("clear the cache")?;
        self.cache.clear();
        Ok(())
    }

    /// Begins a run over `order`. The previous run's state is discarded
    /// and the observer is told to drop stale highlights. The cache is
    /// NOT cleared here; callers decide whether to start warm or cold.
    pub fn start(
        &mut self,
        order: TraversalOrder,
        obs: &mut dyn Observer,
    ) -> Result<(), PreconditionError> {
        self.ensure_not_running("restart")?;
        if self.accesses.is_empty() {
            return Err(PreconditionError::NoAccessSequence);
        }
        if order.is_empty() {
            return Err(PreconditionError::EmptyTraversalOrder);
        }
        // the order may have been built against a sequence that has since
        // been regenerated at a different length
        for &index in order.indices() {
            if index >= self.accesses.len() {
                return Err(PreconditionError::OrderIndexOutOfRange {
                    index,
                    len: self.accesses.len(),
                });
            }
        }
        log::info!("run started: {} scheduled accesses", order.len());
        #[cfg(feature = "stat")]
        {
            self.stat_builder = stat::SessionStatBuilder::new();
        }
        self.run = RunState {
            order,
            running: true,
            ..Default::default()
        };
        let loaded = self.load_position(0);
        debug_assert!(loaded);
        obs.on_reset();
        Ok(())
    }

    /// Cooperative cancellation: takes effect immediately because it can
    /// only be called between ticks. A committed step stays committed.
    pub fn stop(&mut self) {
        if self.run.running {
            log::info!("run stopped at position {}", self.run.position);
            self.halt();
        }
    }

    /// One tick: a single scan step or a single outcome transition.
    /// Returns `Halted` without side effects once the run is over.
    pub fn tick(&mut self, obs: &mut dyn Observer) -> Result<ControlFlow, LookupError> {
        if !self.run.running {
            return Ok(ControlFlow::Halted);
        }
        match self.run.phase {
            Phase::ScanningCache => self.cache_scan_step(obs),
            Phase::ScanningMemory => self.memory_scan_step(obs),
            // running is never set in these phases
            Phase::Idle | Phase::Halted => Ok(ControlFlow::Halted),
        }
    }

    /// Ticks until the run halts. Pacing-free; animated callers loop over
    /// [`Session::tick`] themselves.
    pub fn run_to_halt(&mut self, obs: &mut dyn Observer) -> Result<(), LookupError> {
        while !self.tick(obs)?.is_halted() {}
        Ok(())
    }

    /// Whole-access lookup, the stepped run collapsed into one call.
    /// Precondition (not runtime-checked): no stepped run in progress.
    pub fn lookup(&mut self, value: Value) -> Result<Outcome, LookupError> {
        debug_assert!(!self.run.running, "lookup must not interleave with a stepped run");
        if let Some(slot) = self.cache.find(value) {
            #[cfg(feature = "stat")]
            self.stat_builder.on_hit();
            return Ok(Outcome {
                kind: OutcomeKind::Hit,
                location: Location::CacheSlot(slot),
                evicted: None,
            });
        }
        let cell = self
            .memory
            .find(value)
            .ok_or(LookupError::ValueNotInMemory { value })?;
        let evicted = self.cache.insert(value);
        #[cfg(feature = "stat")]
        self.stat_builder.on_miss(evicted.is_some());
        Ok(Outcome {
            kind: OutcomeKind::Miss,
            location: Location::MemoryCell(cell),
            evicted,
        })
    }

    /// Loads the access scheduled at `position`; false when the order is
    /// exhausted.
    fn load_position(&mut self, position: usize) -> bool {
        let loaded = self
            .run
            .order
            .get(position)
            .and_then(|index| self.accesses.get(index).map(|value| (index, value)));
        match loaded {
            Some((access_index, value)) => {
                self.run.position = position;
                self.run.access_index = access_index;
                self.run.value = value;
                self.run.cursor = 0;
                self.run.phase = Phase::ScanningCache;
                true
            }
            None => false,
        }
    }

    fn cache_scan_step(&mut self, obs: &mut dyn Observer) -> Result<ControlFlow, LookupError> {
        let slot = self.run.cursor;
        if slot == self.cache.capacity() {
            // cache exhausted; chain straight into the first memory step,
            // a zero-delay handoff
            self.run.phase = Phase::ScanningMemory;
            self.run.cursor = 0;
            return self.memory_scan_step(obs);
        }
        let candidate = self.cache.value_at(slot);
        let is_hit = candidate == Some(self.run.value);
        #[cfg(feature = "stat")]
        self.stat_builder.on_cache_step();
        obs.on_cache_step(slot, candidate, is_hit);
        if is_hit {
            log::debug!("hit: value {:03} at cache slot {slot}", self.run.value);
            #[cfg(feature = "stat")]
            self.stat_builder.on_hit();
            obs.on_access_resolved(self.run.access_index, OutcomeKind::Hit);
            Ok(self.advance(obs))
        } else {
            self.run.cursor += 1;
            Ok(ControlFlow::Running)
        }
    }

    fn memory_scan_step(&mut self, obs: &mut dyn Observer) -> Result<ControlFlow, LookupError> {
        let linear = self.run.cursor;
        if linear == self.memory.len() {
            let value = self.run.value;
            log::error!("memory scan exhausted looking for {value:03}; aborting run");
            self.halt();
            obs.on_run_halted();
            return Err(LookupError::ValueNotInMemory { value });
        }
        let cell = self.memory.cell_at(linear);
        let candidate = self.memory.value_at_linear(linear);
        let is_hit = candidate == self.run.value;
        #[cfg(feature = "stat")]
        self.stat_builder.on_memory_step();
        obs.on_memory_step(cell, candidate, is_hit);
        if is_hit {
            let evicted = self.cache.insert(self.run.value);
            log::debug!(
                "miss: value {:03} found at {cell}, evicted {evicted:?}",
                self.run.value
            );
            #[cfg(feature = "stat")]
            self.stat_builder.on_miss(evicted.is_some());
            obs.on_cache_updated(&self.cache.residents(), evicted);
            obs.on_access_resolved(self.run.access_index, OutcomeKind::Miss);
            Ok(self.advance(obs))
        } else {
            self.run.cursor += 1;
            Ok(ControlFlow::Running)
        }
    }

    fn advance(&mut self, obs: &mut dyn Observer) -> ControlFlow {
        if self.load_position(self.run.position + 1) {
            ControlFlow::Running
        } else {
            self.halt();
            obs.on_run_halted();
            ControlFlow::Halted
        }
    }

    fn halt(&mut self) {
        self.run.running = false;
        self.run.phase = Phase::Halted;
        #[cfg(feature = "stat")]
        self.stat_builder.stop_timer();
    }
}

#[cfg(feature = "stat")]
impl Session {
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Session {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(self.stat_builder.finish()));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use std::{fmt, time};

    pub struct SessionStatBuilder {
        begin: time::Instant,
        hits: usize,
        misses: usize,
        evictions: usize,
        cache_steps: usize,
        memory_steps: usize,
        elapsed: Option<time::Duration>,
    }

    impl SessionStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                hits: 0,
                misses: 0,
                evictions: 0,
                cache_steps: 0,
                memory_steps: 0,
                elapsed: None,
            }
        }
        pub fn on_cache_step(&mut self) {
            self.cache_steps += 1;
        }
        pub fn on_memory_step(&mut self) {
            self.memory_steps += 1;
        }
        pub fn on_hit(&mut self) {
            self.hits += 1;
        }
        pub fn on_miss(&mut self, evicted: bool) {
            self.misses += 1;
            if evicted {
                self.evictions += 1;
            }
        }
        pub fn stop_timer(&mut self) {
            self.elapsed = Some(self.begin.elapsed())
        }
        pub fn finish(&self) -> SessionStat {
            SessionStat {
                hits: self.hits,
                misses: self.misses,
                evictions: self.evictions,
                cache_steps: self.cache_steps,
                memory_steps: self.memory_steps,
                elapsed: self.elapsed.unwrap_or_else(|| self.begin.elapsed()),
            }
        }
    }

    impl Default for SessionStatBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    pub struct SessionStat {
        hits: usize,
        misses: usize,
        evictions: usize,
        cache_steps: usize,
        memory_steps: usize,
        elapsed: time::Duration,
    }

    impl Stat for SessionStat {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SessionStat {
        fn header(&self) -> &'static str {
            "run stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ SessionStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let resolved = self.hits + self.misses;
            writeln!(f, "  accesses resolved: {resolved:>10}")?;
            writeln!(f, "  cache hits: {:>17}", self.hits)?;
            writeln!(f, "  cache misses: {:>15}", self.misses)?;
            let ratio = if resolved > 0 {
                format!("{:.1} %", self.hits as f64 * 100.0 / resolved as f64)
            } else {
                "-".to_string()
            };
            writeln!(f, "  hit ratio: {ratio:>18}")?;
            writeln!(f, "  evictions: {:>18}", self.evictions)?;
            writeln!(f, "  cache slots scanned: {:>8}", self.cache_steps)?;
            writeln!(f, "  memory cells scanned: {:>7}", self.memory_steps)?;
            let ms = format!("{} ms", self.elapsed.as_millis());
            write!(f, "  elapsed total: {ms:>14}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Cell;
    use crate::observer::NullObserver;
    use rand::{rngs::StdRng, SeedableRng};

    #[derive(Debug, PartialEq, Eq, Clone)]
    enum Event {
        Reset,
        CacheStep(usize, Option<Value>, bool),
        MemoryStep(Cell, Value, bool),
        CacheUpdated(Vec<Value>, Option<Value>),
        Resolved(usize, OutcomeKind),
        Halted,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Observer for Recorder {
        fn on_reset(&mut self) {
            self.events.push(Event::Reset);
        }
        fn on_cache_step(&mut self, slot: usize, candidate: Option<Value>, is_hit: bool) {
            self.events.push(Event::CacheStep(slot, candidate, is_hit));
        }
        fn on_memory_step(&mut self, cell: Cell, candidate: Value, is_hit: bool) {
            self.events.push(Event::MemoryStep(cell, candidate, is_hit));
        }
        fn on_cache_updated(&mut self, residents: &[Value], evicted: Option<Value>) {
            self.events
                .push(Event::CacheUpdated(residents.to_vec(), evicted));
        }
        fn on_access_resolved(&mut self, index: usize, kind: OutcomeKind) {
            self.events.push(Event::Resolved(index, kind));
        }
        fn on_run_halted(&mut self) {
            self.events.push(Event::Halted);
        }
    }

    impl Recorder {
        fn outcomes(&self) -> Vec<(usize, OutcomeKind)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Resolved(i, k) => Some((*i, *k)),
                    _ => None,
                })
                .collect()
        }
        fn cache_snapshots(&self) -> Vec<Vec<Value>> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::CacheUpdated(r, _) => Some(r.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn literal_session() -> Session {
        // the reference scenario: grid 1x4 = [5, 9, 5, 2], capacity 2
        Session::with_accesses(
            MemoryStore::from_raw(1, 4, vec![5, 9, 5, 2]),
            2,
            AccessSequence::from_values(vec![5, 9, 5, 2, 5]),
        )
    }

    fn run_identity(session: &mut Session, rec: &mut Recorder) {
        let order = TraversalOrder::identity(session.accesses().len());
        session.start(order, rec).unwrap();
        session.run_to_halt(rec).unwrap();
    }

    #[test]
    fn literal_scenario_matches_expected_trace() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);

        use OutcomeKind::*;
        assert_eq!(
            rec.outcomes(),
            vec![(0, Miss), (1, Miss), (2, Hit), (3, Miss), (4, Miss)]
        );
        assert_eq!(
            rec.cache_snapshots(),
            vec![vec![5], vec![5, 9], vec![9, 2], vec![2, 5]]
        );
        assert_eq!(session.cache().residents(), vec![2, 5]);
        assert_eq!(session.phase(), Phase::Halted);
    }

    #[test]
    fn eviction_reports_the_oldest_resident() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);

        let evictions: Vec<_> = rec
            .events
            .iter()
            .filter_map(|e| match e {
                Event::CacheUpdated(_, Some(v)) => Some(*v),
                _ => None,
            })
            .collect();
        // access 4 (value 2) evicts 5, access 5 (value 5) evicts 9
        assert_eq!(evictions, vec![5, 9]);
    }

    #[test]
    fn miss_event_ordering_is_scan_then_update_then_outcome() {
        let mut session = Session::with_accesses(
            MemoryStore::from_raw(1, 2, vec![7, 3]),
            2,
            AccessSequence::from_values(vec![3]),
        );
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);

        assert_eq!(
            rec.events,
            vec![
                Event::Reset,
                Event::CacheStep(0, None, false),
                Event::CacheStep(1, None, false),
                Event::MemoryStep(Cell::new(0, 0), 7, false),
                Event::MemoryStep(Cell::new(0, 1), 3, true),
                Event::CacheUpdated(vec![3], None),
                Event::Resolved(0, OutcomeKind::Miss),
                Event::Halted,
            ]
        );
    }

    #[test]
    fn hit_stops_the_scan_at_the_matching_slot() {
        let mut session = Session::with_accesses(
            MemoryStore::from_raw(1, 2, vec![7, 3]),
            4,
            AccessSequence::from_values(vec![7, 7]),
        );
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);

        // second access hits at slot 0: exactly one cache step, no memory
        // steps, cache untouched
        let tail: Vec<_> = rec
            .events
            .iter()
            .skip_while(|e| !matches!(e, Event::Resolved(0, _)))
            .skip(1)
            .cloned()
            .collect();
        assert_eq!(
            tail,
            vec![
                Event::CacheStep(0, Some(7), true),
                Event::Resolved(1, OutcomeKind::Hit),
                Event::Halted,
            ]
        );
        assert_eq!(session.cache().residents(), vec![7]);
    }

    #[test]
    fn one_tick_is_one_scan_step() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        let order = TraversalOrder::identity(5);
        session.start(order, &mut rec).unwrap();

        // first access: slots 0 and 1 miss (cache empty), then the cache
        // exhaustion tick chains into the first memory step
        session.tick(&mut rec).unwrap();
        assert_eq!(rec.events.len(), 2); // reset + first cache step
        session.tick(&mut rec).unwrap();
        assert_eq!(rec.events.len(), 3);
        // third tick chains into memory, finds 5 at (0, 0) and resolves
        session.tick(&mut rec).unwrap();
        assert_eq!(
            rec.events[3..],
            [
                Event::MemoryStep(Cell::new(0, 0), 5, true),
                Event::CacheUpdated(vec![5], None),
                Event::Resolved(0, OutcomeKind::Miss),
            ]
        );
    }

    #[test]
    fn traversal_subset_resolves_only_scheduled_positions() {
        let mut session = Session::with_accesses(
            MemoryStore::from_raw(2, 2, vec![10, 20, 30, 40]),
            4,
            AccessSequence::from_values(vec![10, 20, 30, 40]),
        );
        let mut rec = Recorder::default();
        let order = TraversalOrder::new(vec![2, 0, 2], 4).unwrap();
        session.start(order, &mut rec).unwrap();
        session.run_to_halt(&mut rec).unwrap();

        use OutcomeKind::*;
        assert_eq!(rec.outcomes(), vec![(2, Miss), (0, Miss), (2, Hit)]);
        // unscheduled values never reach the cache
        assert_eq!(session.cache().residents(), vec![30, 10]);
    }

    #[test]
    fn stop_between_ticks_commits_nothing_further() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        session.start(TraversalOrder::identity(5), &mut rec).unwrap();
        session.tick(&mut rec).unwrap();
        session.tick(&mut rec).unwrap();

        session.stop();
        assert_eq!(session.phase(), Phase::Halted);
        assert!(!session.is_running());
        let before = rec.events.len();
        assert!(session.tick(&mut rec).unwrap().is_halted());
        assert_eq!(rec.events.len(), before);
    }

    #[test]
    fn start_preconditions_leave_state_unchanged() {
        let mut session = literal_session();
        let mut rec = Recorder::default();

        assert_eq!(
            session.start(TraversalOrder::identity(0), &mut rec),
            Err(PreconditionError::EmptyTraversalOrder)
        );
        // stale order built for a longer sequence
        let stale = TraversalOrder::new(vec![0, 9], 10).unwrap();
        assert_eq!(
            session.start(stale, &mut rec),
            Err(PreconditionError::OrderIndexOutOfRange { index: 9, len: 5 })
        );
        assert_eq!(session.phase(), Phase::Idle);
        assert!(rec.events.is_empty());

        let mut empty = Session::new(MemoryStore::new(2, 2), 2);
        assert_eq!(
            empty.start(TraversalOrder::identity(1), &mut rec),
            Err(PreconditionError::NoAccessSequence)
        );
    }

    #[test]
    fn mutations_are_rejected_while_running() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        session.start(TraversalOrder::identity(5), &mut rec).unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            session.fill(&mut rng),
            Err(PreconditionError::MutateWhileRunning { .. })
        ));
        assert!(matches!(
            session.generate(3, &mut rng),
            Err(PreconditionError::MutateWhileRunning { .. })
        ));
        assert!(matches!(
            session.clear_cache(),
            Err(PreconditionError::MutateWhileRunning { .. })
        ));
        assert!(matches!(
            session.start(TraversalOrder::identity(5), &mut rec),
            Err(PreconditionError::MutateWhileRunning { .. })
        ));
        // the run is still advanceable
        assert_eq!(session.tick(&mut rec).unwrap(), ControlFlow::Running);
    }

    #[test]
    fn foreign_value_aborts_the_run() {
        let mut session = Session::with_accesses(
            MemoryStore::from_raw(1, 3, vec![1, 2, 3]),
            2,
            AccessSequence::from_values(vec![999]),
        );
        let mut rec = Recorder::default();
        session.start(TraversalOrder::identity(1), &mut rec).unwrap();
        let err = session.run_to_halt(&mut rec).unwrap_err();
        assert_eq!(err, LookupError::ValueNotInMemory { value: 999 });
        assert_eq!(session.phase(), Phase::Halted);
        assert_eq!(rec.events.last(), Some(&Event::Halted));
        // no phantom insert happened
        assert!(session.cache().is_empty());
    }

    #[test]
    fn lookup_matches_the_stepped_run() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut memory = MemoryStore::new(6, 9);
        memory.fill(&mut rng);
        let accesses = AccessSequence::generate(50, &memory, &mut rng);

        let mut stepped = Session::with_accesses(memory.clone(), 5, accesses.clone());
        let mut rec = Recorder::default();
        run_identity(&mut stepped, &mut rec);

        let mut direct = Session::with_accesses(memory, 5, accesses.clone());
        let mut outcomes = Vec::new();
        for &v in accesses.values() {
            outcomes.push(direct.lookup(v).unwrap().kind);
        }
        assert_eq!(
            rec.outcomes().iter().map(|&(_, k)| k).collect::<Vec<_>>(),
            outcomes
        );
        assert_eq!(stepped.cache().residents(), direct.cache().residents());
    }

    #[test]
    fn lookup_hit_leaves_cache_unchanged() {
        let mut session = literal_session();
        assert!(!session.lookup(9).unwrap().is_hit());
        let before = session.cache().residents();
        let outcome = session.lookup(9).unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Hit);
        assert_eq!(outcome.location, Location::CacheSlot(0));
        assert_eq!(session.cache().residents(), before);
    }

    #[test]
    fn lookup_miss_locates_lowest_row_major_cell() {
        let mut session = literal_session();
        let outcome = session.lookup(5).unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Miss);
        assert_eq!(outcome.location, Location::MemoryCell(Cell::new(0, 0)));
        assert_eq!(session.cache().residents(), vec![5]);
    }

    #[test]
    fn relookup_after_miss_is_a_hit() {
        let mut session = literal_session();
        assert!(!session.lookup(2).unwrap().is_hit());
        assert!(session.lookup(2).unwrap().is_hit());
    }

    #[test]
    fn cache_never_exceeds_capacity_during_a_long_run() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut session = Session::new(MemoryStore::new(10, 20), 8);
        session.fill(&mut rng).unwrap();
        session.generate(120, &mut rng).unwrap();
        let mut obs = NullObserver;
        session
            .start(TraversalOrder::identity(120), &mut obs)
            .unwrap();
        loop {
            if session.tick(&mut obs).unwrap().is_halted() {
                break;
            }
            assert!(session.cache().len() <= session.cache().capacity());
        }
    }

    #[test]
    fn restart_after_halt_reuses_the_session() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);
        assert_eq!(session.phase(), Phase::Halted);

        // warm restart: cache still holds [2, 5], so access 5 hits now
        let mut rec2 = Recorder::default();
        session
            .start(TraversalOrder::new(vec![0], 5).unwrap(), &mut rec2)
            .unwrap();
        session.run_to_halt(&mut rec2).unwrap();
        assert_eq!(rec2.outcomes(), vec![(0, OutcomeKind::Hit)]);
    }

    #[cfg(feature = "stat")]
    #[test]
    fn stat_counts_hits_misses_and_evictions() {
        let mut session = literal_session();
        let mut rec = Recorder::default();
        run_identity(&mut session, &mut rec);
        // rendered view carries the counters; spot-check the text
        let text = format!("{}", session.collect_stat().view(80));
        assert!(text.contains("cache hits"));
        assert!(text.contains("1"), "one hit expected in {text}");
    }
}
