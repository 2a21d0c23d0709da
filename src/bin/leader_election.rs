//! Leader election demo
//!
//! Starts with everyone a leader and reports the shrinking leader count
//! until exactly one remains.

use popsim::monitor::{MonitorSignal, RoundBasedMonitor};
use popsim::protocol::transition_matrix;
use popsim::protocols::LeaderElectionProtocol;
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, Simulator};
use popsim::urns::{Urn, WeightedUrn};

use clap::Parser;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// Leader election demo
#[derive(Parser, Debug)]
#[command(name = "leader-election", version, about)]
struct Args {
    /// Number of agents
    #[arg(short = 'n', long = "agents", default_value = "1000000")]
    num_agents: u64,

    /// Number of rounds to simulate at most
    #[arg(short = 'R', long = "repetitions", default_value = "1000")]
    num_rounds: u64,

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

    let mut protocol = LeaderElectionProtocol;
    println!("{}", transition_matrix(&mut protocol, 2));

    let mut urn = WeightedUrn::new(2);
    urn.add_balls(LeaderElectionProtocol::LEADER, args.num_agents);

    let num_agents = args.num_agents;
    let report = move |sim: &BatchSimulator<WeightedUrn, LeaderElectionProtocol, DefaultEngine>,
                       signal: &mut MonitorSignal| {
        let num_leaders = sim.agents().count(LeaderElectionProtocol::LEADER);
        println!(
            "Leaders: {:15} ({:.4}%)",
            num_leaders,
            100.0 * num_leaders as f64 / num_agents as f64
        );
        if num_leaders == 1 {
            signal.stop_simulation();
        }
    };

    let mut rng = DefaultEngine::seed_from_u64(args.seed);
    let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);
    let mut monitor = RoundBasedMonitor::new(10, args.num_rounds, report);
    simulator.run(|sim| monitor.observe(sim));

    Ok(())
}
