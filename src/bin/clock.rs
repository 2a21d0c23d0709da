//! Phase-clock demo
//!
//! Simulates the clock protocol on a large population and periodically draws
//! a terminal histogram of the digit occupancy, together with the current
//! maximum dial gap.

use popsim::monitor::{MonitorSignal, RoundBasedMonitor};
use popsim::protocols::ClockProtocol;
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, Simulator};
use popsim::urns::{Urn, WeightedUrn};
use popsim::Protocol;

use anyhow::ensure;
use clap::Parser;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// Clock protocol demo
#[derive(Parser, Debug)]
#[command(name = "clock", version, about)]
struct Args {
    /// Seed value; a random seed is drawn when omitted
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Number of agents
    #[arg(short = 'n', long = "agents", default_value = "1000000")]
    num_agents: u64,

    /// Digits on the clock dial
    #[arg(short = 'm', long = "clocksize", default_value = "12")]
    digits_on_clock: usize,

    /// Number of rounds to simulate
    #[arg(short = 'R', long = "repetitions", default_value = "1000")]
    num_rounds: u64,

    /// Height of the histogram in terminal lines
    #[arg(short = 'l', long = "lines", default_value = "10")]
    num_output_lines: u64,

    /// Number of rounds between reports
    #[arg(short = 'g', long = "gap", default_value = "1")]
    rounds_between_reports: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::try_parse().unwrap_or_else(|error| {
        let _ = error.print();
        std::process::exit(1);
    });

    ensure!(args.num_agents > 1, "need at least two agents");
    ensure!(args.digits_on_clock > 1, "need at least two digits");

    let seed = args.seed.unwrap_or_else(rand::random);
    println!("Seed: {}", seed);

    // Setup the initial population: everyone spread uniformly over the dial,
    // with about sqrt(n) marked pacemakers among them
    let protocol = ClockProtocol::new(args.digits_on_clock);
    let mut urn = WeightedUrn::new(protocol.num_states());
    let num_marked = (args.num_agents as f64).sqrt().round() as u64;
    protocol.fill_uniform(&mut urn, args.num_agents, num_marked);

    let histogram_args = args_for_histogram(&args);
    let report = move |sim: &BatchSimulator<WeightedUrn, ClockProtocol, DefaultEngine>,
                       _signal: &mut MonitorSignal| {
        print_histogram(&histogram_args, sim);
    };

    let mut rng = DefaultEngine::seed_from_u64(seed);
    let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);
    let mut monitor =
        RoundBasedMonitor::new(args.rounds_between_reports, args.num_rounds, report);
    simulator.run(|sim| monitor.observe(sim));

    Ok(())
}

/// The subset of the configuration the reporter needs.
#[derive(Clone, Copy)]
struct HistogramArgs {
    num_agents: u64,
    num_output_lines: u64,
}

fn args_for_histogram(args: &Args) -> HistogramArgs {
    HistogramArgs {
        num_agents: args.num_agents,
        num_output_lines: args.num_output_lines,
    }
}

fn print_histogram(
    args: &HistogramArgs,
    simulator: &BatchSimulator<WeightedUrn, ClockProtocol, DefaultEngine>,
) {
    let protocol = simulator.protocol();
    let agents = simulator.agents();
    let num_agents = agents.total();

    if agents.num_colors() > 30 {
        return;
    }

    println!(
        "Interactions: {:10} ({} rounds)",
        simulator.num_interactions(),
        simulator.num_interactions() / num_agents
    );

    let per_digit: Vec<(u64, u64)> = (0..protocol.digits_on_clock())
        .map(|digit| {
            let unmarked = agents.count(protocol.encode(digit, false));
            let marked = agents.count(protocol.encode(digit, true));
            (unmarked + marked, marked)
        })
        .collect();

    // Histogram body, one threshold per line from top to bottom
    for line in (1..args.num_output_lines).rev() {
        let print_if_above =
            ((args.num_agents as f64 / args.num_output_lines as f64) * (line as f64 - 0.5)) as u64;
        for &(total, marked) in &per_digit {
            let symbol = if marked > print_if_above {
                '+'
            } else if total > print_if_above {
                '*'
            } else {
                ' '
            };
            print!("  |  {}", symbol);
        }
        println!("  |");
    }

    // Population percentage per digit
    print!("  ");
    for &(total, _) in &per_digit {
        print!(
            "|{:3}.{}",
            100 * total / args.num_agents,
            (1000 * total / args.num_agents) % 10
        );
    }
    println!("|");

    // Digit labels
    print!(" ");
    for digit in 0..protocol.digits_on_clock() {
        print!(" | {:3}", digit);
    }
    println!(" |");

    println!(" max dial gap: {}\n", protocol.max_gap(agents.as_ref(), 0));
}
