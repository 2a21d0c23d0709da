//! Benchmark harness
//!
//! Runs one simulator/protocol combination for a fixed number of rounds and
//! emits one CSV line per run. Unless capped with `-N`, the population size
//! doubles geometrically until a single run exceeds the time budget, which
//! makes scaling plots a one-liner.

use popsim::protocols::{ClockProtocol, RandomProtocolOneWay, RandomProtocolTwoWay};
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, DistributionSimulator, PopulationSimulator, Simulator};
use popsim::urns::{AliasUrn, LinearUrn, TreeUrn, Urn, WeightedUrn};
use popsim::Protocol;

use anyhow::ensure;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SimulatorKind {
    Batch,
    BatchTree,
    Pop,
    Pop4,
    Pop8,
    DistrLinear,
    DistrTree,
    DistrAlias,
}

impl SimulatorKind {
    fn name(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::BatchTree => "batch-tree",
            Self::Pop => "pop",
            Self::Pop4 => "pop4",
            Self::Pop8 => "pop8",
            Self::DistrLinear => "distr-linear",
            Self::DistrTree => "distr-tree",
            Self::DistrAlias => "distr-alias",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ProtocolKind {
    /// Random one-way transition table
    Random1,
    /// Random two-way transition table
    Random2,
    Clock,
    RunningClock,
}

impl ProtocolKind {
    fn name(self) -> &'static str {
        match self {
            Self::Random1 => "random1",
            Self::Random2 => "random2",
            Self::Clock => "clock",
            Self::RunningClock => "running-clock",
        }
    }
}

/// Population protocol benchmark
#[derive(Parser, Debug, Clone)]
#[command(name = "bench", version, about)]
struct Args {
    /// Simulator to benchmark
    #[arg(short = 'a', long = "simulator", value_enum, default_value = "batch")]
    simulator: SimulatorKind,

    /// Protocol to simulate
    #[arg(short = 'p', long = "protocol", value_enum, default_value = "random1")]
    protocol: ProtocolKind,

    /// Number of agents
    #[arg(short = 'n', long = "agents", default_value = "1024")]
    num_agents: u64,

    /// Max. number of agents; the population doubles geometrically up to here
    #[arg(short = 'N', long = "maxagents", default_value_t = u64::MAX)]
    num_max_agents: u64,

    /// Max time budget per run in seconds
    #[arg(short = 't', long = "time", default_value = "10.0")]
    time_budget_secs: f64,

    /// Number of states
    #[arg(short = 'd', long = "states", default_value = "20")]
    num_states: usize,

    /// Number of rounds
    #[arg(short = 'r', long = "rounds", default_value = "10")]
    num_rounds: u64,

    /// Number of repeats
    #[arg(short = 'R', long = "repeats", default_value = "1")]
    num_repeats: u32,

    /// Seed value; a random seed is drawn when omitted
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Print the CSV header and quit
    #[arg(long = "header-only")]
    header_only: bool,
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so that stdout stays pure CSV
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = Args::try_parse().unwrap_or_else(|error| {
        let _ = error.print();
        std::process::exit(1);
    });

    if args.header_only {
        println!("simulator,protocol,num_agents,num_states,num_rounds,seed,num_interactions,walltime");
        return Ok(());
    }

    ensure!(args.num_agents > 1, "need at least two agents");
    ensure!(args.num_states > 1, "need at least two states");

    let seed = args.seed.unwrap_or_else(rand::random);
    args.seed = Some(seed);
    let mut rng = DefaultEngine::seed_from_u64(seed);

    info!(
        simulator = args.simulator.name(),
        protocol = args.protocol.name(),
        seed,
        "starting benchmark"
    );

    for _repeat in 0..args.num_repeats {
        let mut num_agents = args.num_agents;
        while num_agents <= args.num_max_agents {
            let mut run_args = args.clone();
            run_args.num_agents = num_agents;

            let elapsed = measure_single_run(&run_args, &mut rng);
            if elapsed >= args.time_budget_secs {
                break;
            }
            match num_agents.checked_mul(2) {
                Some(doubled) => num_agents = doubled,
                None => break,
            }
        }
    }

    Ok(())
}

fn measure_single_run(args: &Args, rng: &mut DefaultEngine) -> f64 {
    match args.protocol {
        ProtocolKind::Clock | ProtocolKind::RunningClock => {
            ensure_even_states(args);
            let digits = args.num_states / 2;
            let protocol = ClockProtocol::new(digits);

            let mut num_agents = args.num_agents;
            let mut num_marked = (args.num_agents as f64).sqrt() as u64 + 1;
            num_agents -= num_marked;

            let mut urn = WeightedUrn::new(args.num_states);
            if args.protocol == ProtocolKind::RunningClock {
                // All agents on digit zero, all pacemakers half a dial ahead
                urn.add_balls(0, num_agents);
                urn.add_balls(args.num_states / 2, num_marked);
            } else {
                for s in 0..digits {
                    let n = num_agents / (args.num_states - s) as u64;
                    urn.add_balls(s, n);
                    num_agents -= n;

                    let n = num_marked / (args.num_states - s) as u64;
                    urn.add_balls(s + digits, n);
                    num_marked -= n;
                }
            }

            select_simulator(args, urn, protocol, rng)
        }
        ProtocolKind::Random1 | ProtocolKind::Random2 => {
            let mut urn = WeightedUrn::new(args.num_states);
            let mut num_agents = args.num_agents;
            for s in 0..args.num_states {
                let n = num_agents / (args.num_states - s) as u64;
                urn.add_balls(s, n);
                num_agents -= n;
            }

            if args.protocol == ProtocolKind::Random1 {
                let protocol = RandomProtocolOneWay::new(rng, args.num_states);
                select_simulator(args, urn, protocol, rng)
            } else {
                let protocol = RandomProtocolTwoWay::new(rng, args.num_states);
                select_simulator(args, urn, protocol, rng)
            }
        }
    }
}

fn ensure_even_states(args: &Args) {
    if args.num_states % 2 != 0 {
        eprintln!("num_states must be even for the clock protocol");
        std::process::exit(1);
    }
}

fn select_simulator<P: Protocol>(
    args: &Args,
    urn: WeightedUrn,
    protocol: P,
    rng: &mut DefaultEngine,
) -> f64 {
    match args.simulator {
        SimulatorKind::Batch => run(args, BatchSimulator::new(urn, protocol, rng)),
        SimulatorKind::BatchTree => {
            let tree = TreeUrn::from_counts(urn.counts());
            run(args, BatchSimulator::new(tree, protocol, rng))
        }
        SimulatorKind::Pop => run(args, PopulationSimulator::<0, _, _>::new(&urn, protocol, rng)),
        SimulatorKind::Pop4 => run(args, PopulationSimulator::<4, _, _>::new(&urn, protocol, rng)),
        SimulatorKind::Pop8 => run(args, PopulationSimulator::<8, _, _>::new(&urn, protocol, rng)),
        SimulatorKind::DistrLinear => {
            let linear = LinearUrn::from_counts(urn.counts());
            run(args, DistributionSimulator::new(linear, protocol, rng))
        }
        SimulatorKind::DistrTree => {
            let tree = TreeUrn::from_counts(urn.counts());
            run(args, DistributionSimulator::new(tree, protocol, rng))
        }
        SimulatorKind::DistrAlias => {
            let alias = AliasUrn::from_counts(urn.counts());
            run(args, DistributionSimulator::new(alias, protocol, rng))
        }
    }
}

fn run<S: Simulator>(args: &Args, mut simulator: S) -> f64 {
    let threshold = args.num_agents * args.num_rounds;

    let start = Instant::now();
    simulator.run(|sim| sim.num_interactions() < threshold);
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "{},{},{},{},{},{},{},{}",
        args.simulator.name(),
        args.protocol.name(),
        args.num_agents,
        args.num_states,
        args.num_rounds,
        args.seed.expect("seed is fixed before the first run"),
        simulator.num_interactions(),
        elapsed
    );

    elapsed
}
