//! Epoch-based simulation of many jointly sampled interactions
//!
//! Performing interactions one by one costs a logarithmic-time urn update per
//! agent touched. This engine instead samples a whole epoch jointly, relying
//! on one observation: as long as an interaction involves only agents that
//! have not interacted in the current epoch yet, the pair is simply a uniform
//! without-replacement sample from the untouched population. The expensive
//! part, figuring out *when* that stops being true, is delegated to the
//! collision distribution.
//!
//! An epoch therefore proceeds in three phases:
//!
//! 1. Sample run lengths. Each run is a maximal stretch of interactions
//!    among untouched agents; its length comes from the collision
//!    distribution, and only the colliding interaction at its end is resolved
//!    explicitly. The untouched pairs inside the run are merely counted as
//!    "delayed" agents.
//! 2. Process the delayed agents in bulk: their first partners are one
//!    without-replacement sample from the untouched urn, and the matching
//!    second partners follow per-color hypergeometric counts, so whole groups
//!    of identical interactions are applied at once.
//! 3. Merge the updated agents back into the population and report to the
//!    monitor.

use super::Simulator;
use crate::collision::CollisionDistribution;
use crate::epoch::EpochLengthController;
use crate::hypergeometric::hypergeometric;
use crate::protocol::{
    partition_oneway_transitions, transition, transitions_without_change, OneWayPartitions,
    Protocol, State,
};
use crate::random::FairCoin;
use crate::urns::{BulkSampling, Urn};

use rand::Rng;

use std::borrow::Cow;

/// The batch simulation engine.
pub struct BatchSimulator<'rng, U, P, R> {
    /// Agents that have not interacted in the current epoch
    agents: U,
    /// Touched agents already carrying their post-interaction state
    updated_agents: U,
    /// Touched agents whose interaction is still owed; always even, since
    /// they pair up among themselves
    num_delayed: u64,

    epoch_length: EpochLengthController,

    protocol: P,
    rng: &'rng mut R,
    fair_coin: FairCoin,
    collision: CollisionDistribution,

    /// Reused buffer for the delayed-agent fixup
    first_agents: Vec<(State, u64)>,

    /// Per first state, the sorted second states whose transition is a no-op
    skip_transitions: Vec<Vec<State>>,
    use_skip_heuristic: bool,

    /// For deterministic one-way protocols, the transition table rows grouped
    /// by image state
    one_way_partitions: OneWayPartitions,

    num_interactions: u64,
    num_runs: u64,
    num_epochs: u64,
}

impl<'rng, U, P, R> BatchSimulator<'rng, U, P, R>
where
    U: Urn + BulkSampling,
    P: Protocol,
    R: Rng,
{
    pub fn new(urn: U, mut protocol: P, rng: &'rng mut R) -> Self {
        assert!(urn.total() > 0, "provided empty urn to simulator");

        let num_states = urn.num_colors();
        let epoch_length = EpochLengthController::new(urn.total());
        let collision =
            CollisionDistribution::new(urn.total() as i64, 0, 2 * epoch_length.max() as i64);

        let mut skip_transitions = Vec::new();
        let mut use_skip_heuristic = false;
        let mut one_way_partitions = OneWayPartitions::new();

        if P::DETERMINISTIC {
            if P::ONE_WAY {
                one_way_partitions = partition_oneway_transitions(&mut protocol, num_states);
            } else {
                let (rows, skips) = transitions_without_change(&mut protocol, num_states);
                // Skipping pays off once enough transitions are elidable
                use_skip_heuristic = skips > num_states;
                skip_transitions = rows;
            }
        } else {
            skip_transitions = vec![Vec::new(); num_states];
        }

        Self {
            updated_agents: U::new(num_states),
            agents: urn,
            num_delayed: 0,
            epoch_length,
            protocol,
            rng,
            fair_coin: FairCoin::new(),
            collision,
            first_agents: Vec::new(),
            skip_transitions,
            use_skip_heuristic,
            one_way_partitions,
            num_interactions: 0,
            num_runs: 0,
            num_epochs: 0,
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    // ### PHASE 1: RUN LENGTHS AND PLANTED COLLISIONS ###

    fn sample_run_lengths_and_plant_collisions(&mut self) {
        let num_agents = self.agents.total() + self.updated_agents.total();

        while self.num_delayed + self.updated_agents.total() < self.epoch_length.current() {
            // Length of the next collision-free run
            let mut num_colliding = self.num_delayed + self.updated_agents.total();
            self.collision.set_red(num_colliding as i64);
            let run_length = loop {
                let length = self.collision.draw(&mut *self.rng) as u64;
                // An empty touched set cannot produce a collision within the
                // very first pair
                if num_colliding > 0 || length >= 2 {
                    break length;
                }
            };
            self.num_delayed += 2 * (run_length / 2);
            num_colliding = self.num_delayed + self.updated_agents.total();

            // The run ends on a collision. If the run length is even, it is
            // the first agent of the closing pair that collides; otherwise it
            // is the second, and the first may independently collide as well.
            let collision_on_first = run_length % 2 == 0;
            let collision_on_second =
                !collision_on_first || self.with_probability(num_colliding, num_agents);

            let first = self.sample_agent(collision_on_first, num_colliding);
            let second = self.sample_agent(collision_on_second, num_colliding);

            let (new_first, new_second) = self.perform_interaction(first, second);
            self.updated_agents.add_balls(new_first, 1);
            self.updated_agents.add_balls(new_second, 1);

            self.num_runs += 1;
            debug_assert!(self.num_delayed % 2 == 0);
        }
    }

    fn sample_agent(&mut self, has_collision: bool, num_colliding: u64) -> State {
        if !has_collision {
            return self.agents.draw_and_remove(&mut *self.rng);
        }
        if self.with_probability(self.num_delayed, num_colliding) {
            self.sample_delayed_agent()
        } else {
            self.updated_agents.draw_and_remove(&mut *self.rng)
        }
    }

    /// Resolve one delayed pair early: the colliding partner is one of its
    /// two members, chosen by a coin flip; the other lands in the updated
    /// set like every other touched agent.
    fn sample_delayed_agent(&mut self) -> State {
        debug_assert!(self.num_delayed >= 2);

        let first = self.agents.draw_and_remove(&mut *self.rng);
        let second = self.agents.draw_and_remove(&mut *self.rng);
        self.num_delayed -= 2;

        let (mut keep, mut store) = self.perform_interaction(first, second);
        if self.fair_coin.flip(&mut *self.rng) {
            std::mem::swap(&mut keep, &mut store);
        }
        self.updated_agents.add_balls(store, 1);
        keep
    }

    // ### PHASE 2: DELAYED-AGENT FIXUP ###

    fn process_delayed_agents(&mut self) {
        if P::DETERMINISTIC && P::ONE_WAY {
            return self.process_delayed_agents_partitioned();
        }

        debug_assert!(self.first_agents.is_empty());
        let mut first_agents = std::mem::take(&mut self.first_agents);
        let skip_transitions = std::mem::take(&mut self.skip_transitions);

        // The first members of all delayed pairs are one without-replacement
        // sample of the untouched urn
        let num_pairs = self.num_delayed / 2;
        {
            let agents = &mut self.agents;
            agents.remove_random(num_pairs, &mut *self.rng, false, |state, count| {
                first_agents.push((state, count));
            });
        }

        for &(first_state, count) in &first_agents {
            let skips = &skip_transitions[first_state];
            let mut left_to_sample = count;
            let mut unconsidered = self.agents.total();

            // Elide the transitions that cannot change anything with a single
            // hypergeometric draw across all skippable second states
            let skippable_balls: u64 = if self.use_skip_heuristic {
                skips.iter().map(|&second| self.agents.count(second)).sum()
            } else {
                0
            };
            if skippable_balls > 0 {
                unconsidered -= skippable_balls;
                let skipped =
                    hypergeometric(&mut *self.rng, skippable_balls, unconsidered, left_to_sample);
                left_to_sample -= skipped;
                self.updated_agents.add_balls(first_state, skipped);
            }

            // Walk the remaining second states, resolving each color's share
            // of the sample in one go
            let mut skip_iter = skips.iter().peekable();
            let mut second: State = 0;
            while left_to_sample > 0 {
                debug_assert!(second < self.agents.num_colors());

                if self.use_skip_heuristic {
                    while skip_iter.next_if(|&&skip| skip < second).is_some() {}
                    if skip_iter.peek() == Some(&&second) {
                        second += 1;
                        continue;
                    }
                }

                let balls_with_color = self.agents.count(second);
                unconsidered -= balls_with_color;
                let selected = if balls_with_color == 0 {
                    0
                } else if unconsidered == 0 {
                    left_to_sample.min(balls_with_color)
                } else {
                    hypergeometric(&mut *self.rng, balls_with_color, unconsidered, left_to_sample)
                };

                if selected > 0 {
                    self.agents.remove_balls(second, selected);
                    self.perform_interactions(first_state, second, selected);
                }

                left_to_sample -= selected;
                second += 1;
            }
        }

        first_agents.clear();
        self.first_agents = first_agents;
        self.skip_transitions = skip_transitions;
    }

    /// Fixup specialization for deterministic one-way protocols: the second
    /// agents never change, so for each first state it suffices to know how
    /// many partners fall into each group of the precomputed partition.
    fn process_delayed_agents_partitioned(&mut self) {
        debug_assert!(self.first_agents.is_empty());
        let mut first_agents = std::mem::take(&mut self.first_agents);
        let one_way_partitions = std::mem::take(&mut self.one_way_partitions);

        let num_pairs = self.num_delayed / 2;
        {
            let agents = &mut self.agents;
            agents.remove_random(num_pairs, &mut *self.rng, false, |state, count| {
                first_agents.push((state, count));
            });
        }

        for &(first_state, count) in &first_agents {
            let mut left_to_sample = count;
            let mut unconsidered = self.agents.total();
            if left_to_sample == 0 {
                continue;
            }

            let groups = &one_way_partitions[first_state];
            if groups.len() == 1 {
                // Whatever the partner, the first agent maps to one state
                self.updated_agents.add_balls(groups[0].1, left_to_sample);
                continue;
            }

            for (preimages, image) in groups {
                let balls_in_group: u64 = preimages
                    .iter()
                    .map(|&second| self.agents.count(second))
                    .sum();
                unconsidered -= balls_in_group;
                let selected = if balls_in_group == 0 {
                    0
                } else if unconsidered == 0 {
                    left_to_sample.min(balls_in_group)
                } else {
                    hypergeometric(&mut *self.rng, balls_in_group, unconsidered, left_to_sample)
                };

                if selected > 0 {
                    self.updated_agents.add_balls(*image, selected);
                }
                left_to_sample -= selected;
                if left_to_sample == 0 {
                    break;
                }
            }
        }

        self.num_interactions += self.num_delayed / 2;

        first_agents.clear();
        self.first_agents = first_agents;
        self.one_way_partitions = one_way_partitions;
    }

    // ### PROTOCOL INVOCATION ###

    fn perform_interaction(&mut self, first: State, second: State) -> (State, State) {
        self.num_interactions += 1;
        transition(&mut self.protocol, (first, second))
    }

    /// Apply `count` independent interactions that all start in
    /// `(first, second)`, feeding the outputs into the updated set.
    fn perform_interactions(&mut self, first: State, second: State, count: u64) {
        if P::DETERMINISTIC {
            let (new_first, new_second) = transition(&mut self.protocol, (first, second));
            self.updated_agents.add_balls(new_first, count);
            self.updated_agents.add_balls(new_second, count);
            self.num_interactions += count;
        } else {
            let before = self.updated_agents.total();

            let updated_agents = &mut self.updated_agents;
            self.protocol.apply_bulk(first, second, count, |state, n| {
                updated_agents.add_balls(state, n);
            });
            if P::ONE_WAY {
                self.updated_agents.add_balls(second, count);
            }
            self.num_interactions += count;

            assert!(
                self.updated_agents.total() == before + 2 * count,
                "the number of updated states assigned does not match the number of interactions"
            );
        }
    }

    fn with_probability(&mut self, good: u64, total: u64) -> bool {
        self.rng.gen_range(1..=total) <= good
    }
}

impl<U, P, R> Simulator for BatchSimulator<'_, U, P, R>
where
    U: Urn + BulkSampling,
    P: Protocol,
    R: Rng,
{
    type Urn = U;

    fn run(&mut self, mut monitor: impl FnMut(&Self) -> bool) {
        self.epoch_length.start();
        loop {
            debug_assert_eq!(self.updated_agents.total(), 0);

            self.sample_run_lengths_and_plant_collisions();
            self.process_delayed_agents();

            // ### PHASE 3: COMMIT ###
            self.agents.add_urn(&self.updated_agents);
            self.updated_agents.clear();
            self.num_delayed = 0;
            self.num_epochs += 1;
            self.epoch_length.update(self.num_interactions);

            if !monitor(self) {
                break;
            }
        }
    }

    fn agents(&self) -> Cow<'_, U> {
        Cow::Borrowed(&self.agents)
    }

    fn num_agents(&self) -> u64 {
        self.agents.total() + self.updated_agents.total()
    }

    fn num_interactions(&self) -> u64 {
        self.num_interactions
    }

    fn num_epochs(&self) -> u64 {
        self.num_epochs
    }

    fn num_runs(&self) -> u64 {
        self.num_runs
    }

    fn target_epoch_length(&self) -> u64 {
        self.epoch_length.current_best()
    }
}
