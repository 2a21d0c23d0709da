//! Majority voting demo
//!
//! Seeds the population with a 25/75 opinion split of strong agents and
//! shows the opinion counts converging as bar charts.

use popsim::monitor::{MonitorSignal, RoundBasedMonitor};
use popsim::protocols::{MajorityProtocol, Opinion};
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, Simulator};
use popsim::urns::{Urn, WeightedUrn};
use popsim::Protocol;

use clap::Parser;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// Majority protocol demo
#[derive(Parser, Debug)]
#[command(name = "majority", version, about)]
struct Args {
    /// Number of agents
    #[arg(short = 'n', long = "agents", default_value = "1000000")]
    num_agents: u64,

    /// Number of rounds to simulate
    #[arg(short = 'R', long = "repetitions", default_value = "100")]
    num_rounds: u64,

    /// Number of rounds between reports
    #[arg(short = 'g', long = "gap", default_value = "10")]
    rounds_between_reports: u64,

    /// Seed value
    #[arg(short = 's', long = "seed", default_value = "10")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::try_parse().unwrap_or_else(|error| {
        let _ = error.print();
        std::process::exit(1);
    });

    let protocol = MajorityProtocol;
    let mut urn = WeightedUrn::new(protocol.num_states());
    let minority = protocol.encode(Opinion { opinion: false, strong: true });
    let majority = protocol.encode(Opinion { opinion: true, strong: true });
    urn.add_balls(minority, args.num_agents / 4 - 1);
    urn.add_balls(majority, args.num_agents - args.num_agents / 4 + 1);

    let report = |sim: &BatchSimulator<WeightedUrn, MajorityProtocol, DefaultEngine>,
                  _signal: &mut MonitorSignal| {
        print_bars(sim);
    };

    let mut rng = DefaultEngine::seed_from_u64(args.seed);
    let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);
    print_bars(&simulator);
    let mut monitor =
        RoundBasedMonitor::new(args.rounds_between_reports, args.num_rounds, report);
    simulator.run(|sim| monitor.observe(sim));

    Ok(())
}

fn print_bars(simulator: &BatchSimulator<WeightedUrn, MajorityProtocol, DefaultEngine>) {
    const BAR_WIDTH: u64 = 80;

    let protocol = simulator.protocol();
    let agents = simulator.agents();
    let char_width = BAR_WIDTH as f64 / agents.total() as f64;

    for state in 0..protocol.num_states() {
        let count = agents.count(state);
        let width = (count as f64 * char_width) as usize;
        let opinion = protocol.decode(state);
        println!(
            "Op: {} Strong: {} |{}{}|{:10}",
            opinion.opinion as u8,
            opinion.strong as u8,
            "*".repeat(width),
            " ".repeat(BAR_WIDTH as usize - width),
            count
        );
    }
}
