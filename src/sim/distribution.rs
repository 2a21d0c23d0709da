//! One-interaction-at-a-time simulation on an urn

use super::Simulator;
use crate::protocol::{transition, Protocol};
use crate::urns::Urn;

use rand::Rng;

use std::borrow::Cow;

/// The simplest engine: every step removes the interacting pair from the urn,
/// applies the transition and reinserts the results.
///
/// Works with any urn, which makes it the reference both for validating the
/// batch engine and for benchmarking urn implementations against each other.
pub struct DistributionSimulator<'rng, U, P, R> {
    agents: U,
    protocol: P,
    rng: &'rng mut R,
    epoch_length: u64,

    num_interactions: u64,
    num_epochs: u64,
}

impl<'rng, U: Urn, P: Protocol, R: Rng> DistributionSimulator<'rng, U, P, R> {
    pub fn new(urn: U, protocol: P, rng: &'rng mut R) -> Self {
        assert!(urn.total() > 1, "need at least two agents");
        // Epochs keep the monitor load roughly comparable to the batch engine
        let epoch_length = (urn.total() as f64).sqrt() as u64 + 1;
        Self {
            agents: urn,
            protocol,
            rng,
            epoch_length,
            num_interactions: 0,
            num_epochs: 0,
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    fn perform_single_interaction(&mut self) {
        // The first agent is removed since its state may change. In one-way
        // communication the second agent stays as it is, so it is only peeked.
        let first = self.agents.draw_and_remove(self.rng);
        let second = if P::ONE_WAY {
            self.agents.draw(self.rng)
        } else {
            self.agents.draw_and_remove(self.rng)
        };

        let (new_first, new_second) = transition(&mut self.protocol, (first, second));

        self.agents.add_balls(new_first, 1);
        if !P::ONE_WAY {
            self.agents.add_balls(new_second, 1);
        }
    }
}

impl<U: Urn, P: Protocol, R: Rng> Simulator for DistributionSimulator<'_, U, P, R> {
    type Urn = U;

    fn run(&mut self, mut monitor: impl FnMut(&Self) -> bool) {
        loop {
            for _ in 0..self.epoch_length {
                self.perform_single_interaction();
            }
            self.num_interactions += self.epoch_length;
            self.num_epochs += 1;
            if !monitor(self) {
                break;
            }
        }
    }

    fn agents(&self) -> Cow<'_, U> {
        Cow::Borrowed(&self.agents)
    }

    fn num_agents(&self) -> u64 {
        self.agents.total()
    }

    fn num_interactions(&self) -> u64 {
        self.num_interactions
    }

    fn num_epochs(&self) -> u64 {
        self.num_epochs
    }

    fn num_runs(&self) -> u64 {
        0
    }

    fn target_epoch_length(&self) -> u64 {
        self.epoch_length
    }
}
