use std::{
    io::{stdin, stdout, Write},
    thread,
    time::Duration,
};

use anyhow::Result;
use core_sim::{
    access::{TraversalOrder, DEFAULT_ACCESS_COUNT},
    sim::{PreconditionError, Session},
};
use rand::rngs::StdRng;

use crate::render::{self, TraceKind, TraceObserver};

peg::parser!(grammar command() for str {
    rule number() -> usize
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("number")) }
        / expected!("number")
    rule millis() -> u64
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("milliseconds")) }
        / expected!("milliseconds")
    rule index_list() -> Vec<usize>
        = l:(number() ++ (_ "," _)) { l }
    rule gen() = "generate" / "gen"
    rule mem() = "memory" / "mem"
    rule trace_setting() -> TraceSetting
        = "all" { TraceSetting::All }
        / "off" { TraceSetting::Off }
        / "cache" { TraceSetting::Only(TraceKind::CacheSteps) }
        / mem() { TraceSetting::Only(TraceKind::MemorySteps) }
        / "outcome" "s"? { TraceSetting::Only(TraceKind::Outcomes) }
    rule show_kind() -> ShowKind
        = mem() { ShowKind::Memory }
        / "cache" { ShowKind::Cache }
        / "list" { ShowKind::List }
        / "phase" { ShowKind::Phase }
        / "stat" { ShowKind::Stat }
    pub(crate) rule parse_command() -> Command
        = _ "fill" _ { Command::Fill }
        / _ gen() n:(__ n:number() { n })? _ { Command::Gen(n) }
        / _ "clear" _ { Command::ClearCache }
        / _ "start" o:(__ l:index_list() { l })? _ { Command::Start(o) }
        / _ "run" _ { Command::Run }
        / _ "step" n:(__ n:number() { n })? _ { Command::Step(n) }
        / _ "stop" _ { Command::Stop }
        / _ "delay" __ ms:millis() _ { Command::Delay(ms) }
        / _ "trace" __ t:trace_setting() _ { Command::Trace(t) }
        / _ "show" __ s:show_kind() _ { Command::Show(s) }
        / _ ("exit" / "quit") _ { Command::Exit }
        / expected!("command")

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

pub(crate) enum Command {
    Fill,
    Gen(Option<usize>),
    ClearCache,
    Start(Option<Vec<usize>>),
    Run,
    Step(Option<usize>),
    Stop,
    Delay(u64),
    Trace(TraceSetting),
    Show(ShowKind),
    Exit,
}

pub(crate) enum TraceSetting {
    All,
    Off,
    Only(TraceKind),
}

pub(crate) enum ShowKind {
    Memory,
    Cache,
    List,
    Phase,
    Stat,
}

pub(crate) fn execute_interactive(
    session: &mut Session,
    rng: &mut StdRng,
    delay_ms: u64,
) -> Result<()> {
    let mut delay = delay_ms;
    let mut filter = TraceKind::all();
    println!("entering interactive.");
    println!("commands: fill, gen [n], clear, start [i,j,..], run, step [n], stop, delay <ms>, trace <kind>, show <what>, exit");
    loop {
        print!("[{}] > ", session.phase());
        stdout().flush()?;
        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            // EOF
            break Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match command::parse_command(&line) {
            Ok(p) => p,
            Err(e) => {
                println!("parse error: expected {}", e.expected);
                continue;
            }
        };
        match parsed {
            Command::Exit => break Ok(()),
            Command::Fill => report(session.fill(rng)),
            Command::Gen(n) => {
                let count = n.unwrap_or(DEFAULT_ACCESS_COUNT);
                report(session.generate(count, rng));
            }
            Command::ClearCache => report(session.clear_cache()),
            Command::Start(indices) => {
                let len = session.accesses().len();
                let order = match indices {
                    Some(v) => match TraversalOrder::new(v, len) {
                        Ok(o) => o,
                        Err(e) => {
                            println!("{e}");
                            continue;
                        }
                    },
                    None => TraversalOrder::identity(len),
                };
                let mut obs = observer(session, filter);
                if let Err(e) = session.start(order, &mut obs) {
                    println!("{e}");
                }
            }
            Command::Run => {
                if !session.is_running() {
                    println!("no run in progress; use start first.");
                    continue;
                }
                advance(session, filter, delay, usize::MAX);
            }
            Command::Step(n) => {
                if !session.is_running() {
                    println!("no run in progress; use start first.");
                    continue;
                }
                advance(session, filter, delay, n.unwrap_or(1));
            }
            Command::Stop => {
                session.stop();
                println!("stopped.");
            }
            Command::Delay(ms) => {
                delay = ms;
                println!("delay set to {ms} ms");
            }
            Command::Trace(t) => {
                filter = match t {
                    TraceSetting::All => TraceKind::all(),
                    TraceSetting::Off => TraceKind::none(),
                    TraceSetting::Only(k) => k | TraceKind::Outcomes,
                };
            }
            Command::Show(k) => show(session, k),
        }
    }
}

fn observer(session: &Session, filter: TraceKind) -> TraceObserver {
    TraceObserver::new(session.accesses().values().to_vec(), filter)
}

fn report(r: Result<(), PreconditionError>) {
    match r {
        Ok(()) => println!("ok"),
        Err(e) => println!("{e}"),
    }
}

/// Up to `limit` paced ticks; the delay is re-read per tick so a `delay`
/// command between steps takes effect on the next one.
fn advance(session: &mut Session, filter: TraceKind, delay: u64, limit: usize) {
    let mut obs = observer(session, filter);
    for i in 0..limit {
        match session.tick(&mut obs) {
            Ok(flow) if flow.is_halted() => break,
            Ok(_) => {
                if i + 1 < limit {
                    thread::sleep(Duration::from_millis(delay));
                }
            }
            Err(e) => {
                println!("fatal: {e}");
                break;
            }
        }
    }
}

fn show(session: &Session, k: ShowKind) {
    match k {
        ShowKind::Memory => {
            for line in render::memory_lines(session.memory()) {
                println!("{line}");
            }
        }
        ShowKind::Cache => println!("{}", render::cache_line(session.cache())),
        ShowKind::List => {
            if session.accesses().is_empty() {
                println!("no access sequence; use gen first.");
            } else {
                for line in render::access_lines(session.accesses().values()) {
                    println!("{line}");
                }
            }
        }
        ShowKind::Phase => println!("{}", session.phase()),
        #[cfg(feature = "stat")]
        ShowKind::Stat => {
            println!("{}", session.collect_stat().view(render::terminal_width()));
        }
        #[cfg(not(feature = "stat"))]
        ShowKind::Stat => {
            println!("try compiling with `--features stat`");
        }
    }
}
