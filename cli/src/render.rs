use bitmask_enum::bitmask;
use core_sim::{
    cache::CacheState,
    common::{Cell, OutcomeKind, Value},
    memory::MemoryStore,
    observer::Observer,
};
use terminal_size::terminal_size;

/// Which event classes the observer prints.
#[bitmask(u8)]
pub enum TraceKind {
    CacheSteps,
    MemorySteps,
    Outcomes,
}

pub fn terminal_width() -> usize {
    terminal_size().map(|(w, _)| w.0 as usize).unwrap_or(120)
}

/// Grid rows as three-digit cells, split into column bands when the
/// terminal is narrower than the grid.
pub fn memory_lines(memory: &MemoryStore) -> Vec<String> {
    let per_band = (terminal_width().saturating_sub(6) / 4).max(1);
    let cols = memory.cols();
    let mut lines = Vec::new();
    let mut band = 0;
    while band < cols {
        let end = (band + per_band).min(cols);
        if band > 0 {
            lines.push(String::new());
        }
        for row in 0..memory.rows() {
            let body = memory.row(row)[band..end]
                .iter()
                .map(|v| format!("{v:03}"))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(format!("r{row:02} | {body}"));
        }
        band = end;
    }
    lines
}

/// One line for the whole cache, unfilled slots shown as `---`.
pub fn cache_line(cache: &CacheState) -> String {
    let slots: Vec<String> = (0..cache.capacity())
        .map(|slot| match cache.value_at(slot) {
            Some(v) => format!("{v:03}"),
            None => "---".to_string(),
        })
        .collect();
    format!("[ {} ]", slots.join(" | "))
}

/// The access list with its positions, wrapped to the terminal.
pub fn access_lines(values: &[Value]) -> Vec<String> {
    let per_line = (terminal_width() / 9).max(1);
    let entries: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| format!("#{i:02}:{v:03}"))
        .collect();
    entries.chunks(per_line).map(|c| c.join("  ")).collect()
}

/// Prints driver notifications as they arrive, subject to a trace filter.
/// Holds its own copy of the access values so outcome lines can show the
/// value, not just the position.
pub struct TraceObserver {
    values: Vec<Value>,
    filter: TraceKind,
}

impl TraceObserver {
    pub fn new(values: Vec<Value>, filter: TraceKind) -> Self {
        Self { values, filter }
    }
}

impl Observer for TraceObserver {
    fn on_reset(&mut self) {
        println!("--- run started ---");
    }

    fn on_cache_step(&mut self, slot: usize, candidate: Option<Value>, is_hit: bool) {
        if !self.filter.contains(TraceKind::CacheSteps) {
            return;
        }
        match candidate {
            Some(v) if is_hit => println!("  cache[{slot}] = {v:03}  <- hit"),
            Some(v) => println!("  cache[{slot}] = {v:03}"),
            None => println!("  cache[{slot}] = ---"),
        }
    }

    fn on_memory_step(&mut self, cell: Cell, candidate: Value, is_hit: bool) {
        if !self.filter.contains(TraceKind::MemorySteps) {
            return;
        }
        if is_hit {
            println!("  mem{cell} = {candidate:03}  <- found");
        } else {
            println!("  mem{cell} = {candidate:03}");
        }
    }

    fn on_cache_updated(&mut self, residents: &[Value], evicted: Option<Value>) {
        if !self.filter.contains(TraceKind::Outcomes) {
            return;
        }
        let body = residents
            .iter()
            .map(|v| format!("{v:03}"))
            .collect::<Vec<_>>()
            .join(" | ");
        match evicted {
            Some(v) => println!("  cache -> [ {body} ]  (evicted {v:03})"),
            None => println!("  cache -> [ {body} ]"),
        }
    }

    fn on_access_resolved(&mut self, index: usize, kind: OutcomeKind) {
        if !self.filter.contains(TraceKind::Outcomes) {
            return;
        }
        match self.values.get(index) {
            Some(v) => println!("access #{index} ({v:03}): {kind}"),
            None => println!("access #{index}: {kind}"),
        }
    }

    fn on_run_halted(&mut self) {
        println!("--- run halted ---");
    }
}
