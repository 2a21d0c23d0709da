//! End-to-end protocol scenarios on the batch engine

use popsim::protocols::{
    ClockProtocol, IncrementOneWay, LeaderElectionProtocol, MajorityProtocol, Opinion,
    RandomProtocolTwoWay,
};
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, DistributionSimulator, Simulator};
use popsim::urns::{TreeUrn, Urn, WeightedUrn};
use popsim::Protocol;

use rand::SeedableRng;

#[test]
fn leader_election_converges_to_a_single_leader() {
    let num_agents = 2_000;
    let mut urn = WeightedUrn::new(2);
    urn.add_balls(LeaderElectionProtocol::LEADER, num_agents);

    let mut rng = DefaultEngine::seed_from_u64(10);
    let mut simulator = BatchSimulator::new(urn, LeaderElectionProtocol, &mut rng);

    let mut last_leaders = num_agents;
    simulator.run(|sim| {
        let leaders = sim.agents().count(LeaderElectionProtocol::LEADER);
        assert!(leaders <= last_leaders, "leader count went up");
        assert!(leaders >= 1, "leaders died out");
        last_leaders = leaders;
        leaders > 1
    });

    let agents = simulator.agents();
    assert_eq!(agents.count(LeaderElectionProtocol::LEADER), 1);
    assert_eq!(agents.count(LeaderElectionProtocol::FOLLOWER), num_agents - 1);
    assert!(simulator.num_interactions() > 0);
}

#[test]
fn leader_count_only_shrinks_on_a_large_population() {
    let num_agents = 1_000_000;
    let mut urn = WeightedUrn::new(2);
    urn.add_balls(LeaderElectionProtocol::LEADER, num_agents);

    let mut rng = DefaultEngine::seed_from_u64(11);
    let mut simulator = BatchSimulator::new(urn, LeaderElectionProtocol, &mut rng);

    let round_budget = 20 * num_agents;
    let mut last_leaders = num_agents;
    simulator.run(|sim| {
        let leaders = sim.agents().count(LeaderElectionProtocol::LEADER);
        assert!(leaders <= last_leaders);
        assert!(leaders >= 1);
        last_leaders = leaders;
        sim.num_interactions() < round_budget
    });

    // Pairwise demotion thins the leaders out like n / (1 + rounds), so
    // after 20 rounds roughly n / 21 remain; n / 10 leaves a safe margin
    assert!(last_leaders < num_agents / 10, "leaders = {}", last_leaders);
}

#[test]
fn majority_keeps_its_head_start() {
    let num_agents: u64 = 1_000_000;
    let protocol = MajorityProtocol;

    let mut urn = WeightedUrn::new(protocol.num_states());
    let minority = protocol.encode(Opinion { opinion: false, strong: true });
    let majority = protocol.encode(Opinion { opinion: true, strong: true });
    urn.add_balls(minority, num_agents / 4 - 1);
    urn.add_balls(majority, num_agents - num_agents / 4 + 1);

    let mut rng = DefaultEngine::seed_from_u64(10);
    let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);

    let budget = 100 * num_agents;
    simulator.run(|sim| sim.num_interactions() < budget);

    let agents = simulator.agents();
    let count_opinion = |opinion: bool| {
        [false, true]
            .iter()
            .map(|&strong| agents.count(protocol.encode(Opinion { opinion, strong })))
            .sum::<u64>()
    };
    let majority_count = count_opinion(true);
    let minority_count = count_opinion(false);

    assert_eq!(majority_count + minority_count, num_agents);
    assert!(
        majority_count > minority_count,
        "majority {} vs minority {}",
        majority_count,
        minority_count
    );
}

#[test]
fn clock_population_never_collapses_to_a_half_dial() {
    let num_agents: u64 = 1_000_000;
    let digits = 12;
    let protocol = ClockProtocol::new(digits);

    let mut urn = WeightedUrn::new(protocol.num_states());
    let num_marked = (num_agents as f64).sqrt().round() as u64;
    protocol.fill_uniform(&mut urn, num_agents, num_marked);
    let num_agents = urn.total();

    let mut rng = DefaultEngine::seed_from_u64(10);
    let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);

    let budget = 50 * num_agents;
    let mut worst_gap = 0;
    simulator.run(|sim| {
        let gap = sim.protocol().max_gap(sim.agents().as_ref(), 0);
        worst_gap = worst_gap.max(gap);
        sim.num_interactions() < budget
    });

    assert!(worst_gap < digits / 2, "worst gap = {}", worst_gap);
}

#[test]
fn increment_interactions_match_the_state_sum_exactly() {
    let mut counts = vec![0u64; 1000];
    counts[0] = 100;
    let urn = WeightedUrn::from_counts(&counts);

    let mut rng = DefaultEngine::seed_from_u64(10);
    let mut simulator = BatchSimulator::new(urn, IncrementOneWay::new(1000), &mut rng);

    simulator.run(|sim| {
        let agents = sim.agents();
        let max_used = (0..agents.num_colors())
            .rev()
            .find(|&c| agents.count(c) > 0)
            .unwrap_or(0);
        max_used < 900
    });

    let agents = simulator.agents();
    let state_sum: u64 = (0..agents.num_colors())
        .map(|c| c as u64 * agents.count(c))
        .sum();
    assert_eq!(simulator.num_interactions(), state_sum);
}

#[test]
fn batch_and_distribution_engines_agree_on_a_random_protocol() {
    let num_agents: u64 = 10_000;
    let num_states = 20;
    let rounds = 100;

    // Both engines simulate the same protocol from the same initial
    // population; only the engine differs.
    let protocol = {
        let mut protocol_rng = DefaultEngine::seed_from_u64(1234);
        RandomProtocolTwoWay::new(&mut protocol_rng, num_states)
    };

    let mut counts = vec![0u64; num_states];
    let mut left = num_agents;
    for s in 0..num_states {
        let n = left / (num_states - s) as u64;
        counts[s] = n;
        left -= n;
    }

    // Average the histogram over the tail of the run: the engines pause at
    // different interaction counts, and averaging suppresses that phase
    // difference along with the epoch-to-epoch noise.
    let budget = rounds * num_agents;
    let tail_start = 3 * budget / 4;

    let distribution_histogram = {
        let mut rng = DefaultEngine::seed_from_u64(42);
        let urn = TreeUrn::from_counts(&counts);
        let mut simulator = DistributionSimulator::new(urn, protocol.clone(), &mut rng);
        let mut tail = TailAverage::new(num_states);
        simulator.run(|sim| {
            if sim.num_interactions() >= tail_start {
                tail.record(sim.agents().as_ref());
            }
            sim.num_interactions() < budget
        });
        tail.histogram()
    };

    let batch_histogram = {
        let mut rng = DefaultEngine::seed_from_u64(42);
        let urn = WeightedUrn::from_counts(&counts);
        let mut simulator = BatchSimulator::new(urn, protocol, &mut rng);
        let mut tail = TailAverage::new(num_states);
        simulator.run(|sim| {
            if sim.num_interactions() >= tail_start {
                tail.record(sim.agents().as_ref());
            }
            sim.num_interactions() < budget
        });
        tail.histogram()
    };

    let sum: f64 = distribution_histogram.iter().sum();
    assert!((sum - num_agents as f64).abs() < 1e-6);

    // The induced state distributions must agree: a chi-square style
    // statistic at a generous threshold, plus a total-variation bound
    let mut chi_square = 0.0;
    let mut total_variation = 0.0;
    for s in 0..num_states {
        let a = distribution_histogram[s];
        let b = batch_histogram[s];
        if a + b > 0.0 {
            chi_square += (a - b) * (a - b) / (a + b);
        }
        total_variation += (a - b).abs();
    }

    assert!(chi_square < 150.0, "chi_square = {}", chi_square);
    assert!(
        total_variation / (2.0 * num_agents as f64) < 0.05,
        "tv = {}",
        total_variation
    );
}

/// Running per-state average of the agent distribution.
struct TailAverage {
    sums: Vec<f64>,
    observations: u64,
}

impl TailAverage {
    fn new(num_states: usize) -> Self {
        Self {
            sums: vec![0.0; num_states],
            observations: 0,
        }
    }

    fn record(&mut self, agents: &impl Urn) {
        for (state, sum) in self.sums.iter_mut().enumerate() {
            *sum += agents.count(state) as f64;
        }
        self.observations += 1;
    }

    fn histogram(&self) -> Vec<f64> {
        assert!(self.observations > 0, "tail window never sampled");
        self.sums
            .iter()
            .map(|&sum| sum / self.observations as f64)
            .collect()
    }
}
