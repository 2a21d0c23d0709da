//! Conservation checks with the increment protocols
//!
//! The increment protocols raise the sum of all agent states by a fixed
//! amount per interaction, so the interaction counter of a correct simulator
//! can be recomputed from the population alone at any epoch boundary. Every
//! engine has to pass with every protocol variant.

use popsim::protocols::{IncrementBoth, IncrementFirst, IncrementOneWay, IncrementSecond};
use popsim::random::DefaultEngine;
use popsim::sim::{BatchSimulator, DistributionSimulator, PopulationSimulator, Simulator};
use popsim::urns::{LinearUrn, TreeUrn, Urn, WeightedUrn};
use popsim::{Protocol, State};

use rand::SeedableRng;
use rand_distr::{Binomial, Distribution};

const NUM_AGENTS: u64 = 100;
const NUM_STATES: usize = 1000;

/// Run until an agent reaches 90% of the state range, checking at every
/// epoch that the interaction counter matches the state sum.
fn check_conservation<S: Simulator>(mut simulator: S, increase_per_interaction: u64) {
    let max_state = (0.9 * NUM_STATES as f64) as usize;

    let mut consistent = true;
    simulator.run(|sim| {
        let agents = sim.agents();
        let state_sum: u64 = (0..agents.num_colors())
            .map(|c| c as u64 * agents.count(c))
            .sum();
        let implied_interactions = state_sum / increase_per_interaction;
        let max_used_state = (0..agents.num_colors())
            .rev()
            .find(|&c| agents.count(c) > 0)
            .unwrap_or(0);

        if implied_interactions != sim.num_interactions() {
            consistent = false;
            return false;
        }
        max_used_state < max_state
    });

    assert!(consistent, "interaction counter diverged from the state sum");

    let agents = simulator.agents();
    let state_sum: u64 = (0..agents.num_colors())
        .map(|c| c as u64 * agents.count(c))
        .sum();
    assert_eq!(
        state_sum / increase_per_interaction,
        simulator.num_interactions()
    );
    // Reaching 90% of the state range takes at least this many interactions
    assert!(
        simulator.num_interactions()
            >= max_state as u64 * NUM_AGENTS / 2 / increase_per_interaction
    );
}

fn initial_counts() -> Vec<u64> {
    let mut counts = vec![0u64; NUM_STATES];
    counts[0] = NUM_AGENTS;
    counts
}

macro_rules! no_losses_suite {
    ($module:ident, $protocol:ty, $strategy_offset:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn batch() {
                let mut rng = DefaultEngine::seed_from_u64(10 + $strategy_offset);
                let urn = WeightedUrn::from_counts(&initial_counts());
                let sim = BatchSimulator::new(urn, <$protocol>::new(NUM_STATES), &mut rng);
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }

            #[test]
            fn distribution_linear() {
                let mut rng = DefaultEngine::seed_from_u64(20 + $strategy_offset);
                let urn = LinearUrn::from_counts(&initial_counts());
                let sim = DistributionSimulator::new(urn, <$protocol>::new(NUM_STATES), &mut rng);
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }

            #[test]
            fn distribution_tree() {
                let mut rng = DefaultEngine::seed_from_u64(30 + $strategy_offset);
                let urn = TreeUrn::from_counts(&initial_counts());
                let sim = DistributionSimulator::new(urn, <$protocol>::new(NUM_STATES), &mut rng);
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }

            #[test]
            fn population_prefetch_0() {
                let mut rng = DefaultEngine::seed_from_u64(40 + $strategy_offset);
                let urn = WeightedUrn::from_counts(&initial_counts());
                let sim =
                    PopulationSimulator::<0, _, _>::new(&urn, <$protocol>::new(NUM_STATES), &mut rng);
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }

            #[test]
            fn population_prefetch_1() {
                let mut rng = DefaultEngine::seed_from_u64(50 + $strategy_offset);
                let urn = WeightedUrn::from_counts(&initial_counts());
                let sim =
                    PopulationSimulator::<1, _, _>::new(&urn, <$protocol>::new(NUM_STATES), &mut rng);
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }

            #[test]
            fn population_prefetch_10() {
                let mut rng = DefaultEngine::seed_from_u64(60 + $strategy_offset);
                let urn = WeightedUrn::from_counts(&initial_counts());
                let sim = PopulationSimulator::<10, _, _>::new(
                    &urn,
                    <$protocol>::new(NUM_STATES),
                    &mut rng,
                );
                check_conservation(sim, <$protocol>::INCREASE_PER_INTERACTION);
            }
        }
    };
}

/// Randomized-interface variant: each application increments either the first
/// or the second agent, decided by a fair coin, so the sum of all states
/// still grows by exactly one per interaction. Exercises the bulk callback
/// plumbing that deterministic protocols never touch.
#[derive(Clone, Debug)]
struct RandomizedIncrement {
    num_states: State,
    rng: DefaultEngine,
}

impl RandomizedIncrement {
    const INCREASE_PER_INTERACTION: u64 = 1;

    fn new(num_states: State) -> Self {
        Self {
            num_states,
            rng: DefaultEngine::seed_from_u64(777),
        }
    }
}

impl Protocol for RandomizedIncrement {
    const DETERMINISTIC: bool = false;
    const ONE_WAY: bool = false;

    fn num_states(&self) -> State {
        self.num_states
    }

    fn apply_bulk(
        &mut self,
        first: State,
        second: State,
        count: u64,
        mut emit: impl FnMut(State, u64),
    ) {
        let first_incremented = Binomial::new(count, 0.5)
            .expect("valid binomial parameters")
            .sample(&mut self.rng);
        emit(first + 1, first_incremented);
        emit(first, count - first_incremented);
        emit(second + 1, count - first_incremented);
        emit(second, first_incremented);
    }
}

no_losses_suite!(one_way, IncrementOneWay, 0);
no_losses_suite!(two_way_first, IncrementFirst, 1);
no_losses_suite!(two_way_second, IncrementSecond, 2);
no_losses_suite!(two_way_both, IncrementBoth, 3);
no_losses_suite!(randomized_interface, RandomizedIncrement, 4);
