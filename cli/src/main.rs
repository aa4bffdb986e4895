mod interactive;
mod render;

use std::{fs::File, path::PathBuf, thread, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use core_sim::{
    access::{TraversalOrder, DEFAULT_ACCESS_COUNT},
    cache::DEFAULT_CAPACITY,
    memory::{MemoryStore, DEFAULT_COLS, DEFAULT_ROWS},
    scenario::Scenario,
    sim::Session,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::render::{TraceKind, TraceObserver};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// simulate over randomly generated memory and accesses
    Random(RandomArgs),
    /// simulate a scenario loaded from a JSON file
    Scenario(ScenarioArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Tick delay in milliseconds, re-read before every tick
    #[arg(long, default_value_t = 200)]
    delay: u64,
    /// Replay only these access positions (comma separated, repeats allowed)
    #[arg(long, value_delimiter = ',')]
    order: Option<Vec<usize>>,
    /// Enter the interactive shell
    #[arg(long)]
    interactive: bool,
    /// Resolve accesses directly, without the step animation
    #[arg(long)]
    no_animate: bool,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RandomArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// Memory grid rows
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: usize,
    /// Memory grid columns
    #[arg(long, default_value_t = DEFAULT_COLS)]
    cols: usize,
    /// Cache capacity
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    cache_size: usize,
    /// Access sequence length
    #[arg(long, default_value_t = DEFAULT_ACCESS_COUNT)]
    count: usize,
    /// RNG seed (drawn from the OS when omitted)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// File path to scenario JSON
    #[arg(short, long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let (common, mut session, order, mut rng) = match args.command {
        Command::Random(RandomArgs {
            delegate,
            rows,
            cols,
            cache_size,
            count,
            seed,
        }) => {
            init_logger(delegate.verbose);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut session = Session::new(MemoryStore::new(rows, cols), cache_size);
            session.fill(&mut rng)?;
            session.generate(count, &mut rng)?;
            let order = parse_order(&delegate, count)?;
            (delegate, session, order, rng)
        }
        Command::Scenario(ScenarioArgs { delegate, input }) => {
            init_logger(delegate.verbose);
            let file = File::open(&input)?;
            let (session, order) = Scenario::deser(file)?.into_session()?;
            log::info!(
                "scenario loaded: {}x{} grid, {} accesses",
                session.memory().rows(),
                session.memory().cols(),
                session.accesses().len()
            );
            let order = match parse_order(&delegate, session.accesses().len())? {
                Some(o) => Some(o),
                None => Some(order),
            };
            (delegate, session, order, StdRng::from_entropy())
        }
    };

    if common.interactive {
        return interactive::execute_interactive(&mut session, &mut rng, common.delay);
    }

    let order = match order {
        Some(o) => o,
        None => TraversalOrder::identity(session.accesses().len()),
    };
    run_once(&mut session, order, &common)?;
    output_stat(&session);
    Ok(())
}

fn init_logger(verbose: bool) {
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
}

fn parse_order(common: &CommonArgs, len: usize) -> Result<Option<TraversalOrder>> {
    Ok(match &common.order {
        Some(indices) => Some(TraversalOrder::new(indices.clone(), len)?),
        None => None,
    })
}

fn run_once(session: &mut Session, order: TraversalOrder, common: &CommonArgs) -> Result<()> {
    for line in render::memory_lines(session.memory()) {
        println!("{line}");
    }
    println!();
    for line in render::access_lines(session.accesses().values()) {
        println!("{line}");
    }
    println!();

    // one-shot runs begin with a cold cache
    session.clear_cache()?;
    let values = session.accesses().values().to_vec();
    if common.no_animate {
        for &position in order.indices() {
            let value = values[position];
            let outcome = session.lookup(value)?;
            match outcome.evicted {
                Some(v) => println!(
                    "access #{position} ({value:03}): {} at {} (evicted {v:03})",
                    outcome.kind, outcome.location
                ),
                None => println!(
                    "access #{position} ({value:03}): {} at {}",
                    outcome.kind, outcome.location
                ),
            }
        }
    } else {
        let mut obs = TraceObserver::new(values, TraceKind::all());
        session.start(order, &mut obs)?;
        loop {
            if session.tick(&mut obs)?.is_halted() {
                break;
            }
            thread::sleep(Duration::from_millis(common.delay));
        }
    }
    println!();
    println!("cache: {}", render::cache_line(session.cache()));
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Session) {}

#[cfg(feature = "stat")]
fn output_stat(session: &Session) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    println!("{}", session.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0 - 20)
}
