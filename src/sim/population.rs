//! Per-agent simulation with software prefetching

use super::Simulator;
use crate::protocol::{transition, Protocol, State};
use crate::urns::{Urn, WeightedUrn};

use rand::Rng;

use std::borrow::Cow;
use std::collections::VecDeque;

/// Engine that stores every agent individually in one long state vector.
///
/// Each interaction picks two distinct agent indices uniformly at random. On
/// large populations those accesses miss every cache level, so the engine can
/// pipeline: with a prefetch depth `PREFETCH > 0` it keeps that many upcoming
/// pairs in a ring buffer, issues prefetch hints for them as they are drawn,
/// and applies the transition only once the data had time to arrive. The
/// depth is a compile-time parameter so the ring can be sized and unrolled by
/// the compiler.
pub struct PopulationSimulator<'rng, const PREFETCH: usize, P, R> {
    population: Vec<State>,
    num_states: State,
    protocol: P,
    rng: &'rng mut R,
    epoch_length: u64,

    /// Indices of drawn but not yet applied pairs, oldest first
    pending: VecDeque<usize>,

    num_interactions: u64,
    num_epochs: u64,
}

impl<'rng, const PREFETCH: usize, P: Protocol, R: Rng> PopulationSimulator<'rng, PREFETCH, P, R> {
    pub fn new(urn: &WeightedUrn, protocol: P, rng: &'rng mut R) -> Self {
        assert!(urn.total() > 1, "need at least two agents");

        // Unroll the urn into one state per agent
        let mut population = Vec::with_capacity(urn.total() as usize);
        for (state, &n) in urn.counts().iter().enumerate() {
            population.resize(population.len() + n as usize, state);
        }

        let epoch_length = ((urn.total() as f64).sqrt() as u64 + 1).max(PREFETCH as u64);

        Self {
            population,
            num_states: urn.num_colors(),
            protocol,
            rng,
            epoch_length,
            pending: VecDeque::with_capacity(2 * PREFETCH),
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

    /// Direct read access to the per-agent states.
    pub fn population(&self) -> &[State] {
        &self.population
    }

    fn draw_pair(&mut self) -> (usize, usize) {
        let num_agents = self.population.len();
        let first = self.rng.gen_range(0..num_agents);
        let second = loop {
            let candidate = self.rng.gen_range(0..num_agents);
            if candidate != first {
                break candidate;
            }
        };
        (first, second)
    }

    /// Unpipelined variant used when `PREFETCH == 0`.
    fn perform_single_interaction(&mut self) {
        let (first, second) = self.draw_pair();
        self.apply_pair(first, second);
    }

    /// Draw a pair, hint the hardware prefetcher at both agents, and queue
    /// the pair for later application.
    fn prefetch_pair(&mut self) {
        let (first, second) = self.draw_pair();
        prefetch_hint(&self.population[first]);
        prefetch_hint(&self.population[second]);
        self.pending.push_back(first);
        self.pending.push_back(second);
    }

    /// Apply the transition of the oldest queued pair.
    fn perform_prefetched_pair(&mut self) {
        let first = self.pending.pop_front().expect("prefetch queue underrun");
        let second = self.pending.pop_front().expect("prefetch queue underrun");
        self.apply_pair(first, second);
    }

    fn apply_pair(&mut self, first: usize, second: usize) {
        debug_assert_ne!(first, second);
        let pair = (self.population[first], self.population[second]);
        let (new_first, new_second) = transition(&mut self.protocol, pair);
        debug_assert!(new_first < self.num_states);
        debug_assert!(new_second < self.num_states);

        self.population[first] = new_first;
        if !P::ONE_WAY {
            self.population[second] = new_second;
        }
    }
}

impl<const PREFETCH: usize, P: Protocol, R: Rng> Simulator
    for PopulationSimulator<'_, PREFETCH, P, R>
{
    type Urn = WeightedUrn;

    fn run(&mut self, mut monitor: impl FnMut(&Self) -> bool) {
        loop {
            if PREFETCH == 0 {
                for _ in 0..self.epoch_length {
                    self.perform_single_interaction();
                }
            } else {
                // Fill the pipeline, run it at full depth, then drain it
                for _ in 0..PREFETCH {
                    self.prefetch_pair();
                }
                for _ in 0..self.epoch_length - PREFETCH as u64 {
                    self.perform_prefetched_pair();
                    self.prefetch_pair();
                }
                for _ in 0..PREFETCH {
                    self.perform_prefetched_pair();
                }
            }

            self.num_interactions += self.epoch_length;
            self.num_epochs += 1;
            if !monitor(self) {
                break;
            }
        }
    }

    fn agents(&self) -> Cow<'_, WeightedUrn> {
        // Recounting the whole population is expensive; monitors that need
        // the distribution every epoch should budget for it
        let mut counts = vec![0u64; self.num_states];
        for &state in &self.population {
            counts[state] += 1;
        }
        Cow::Owned(WeightedUrn::from_counts(&counts))
    }

    fn num_agents(&self) -> u64 {
        self.population.len() as u64
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

/// Ask the CPU to pull the agent's cache line while other pairs are handled.
#[inline]
fn prefetch_hint(slot: &State) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        _mm_prefetch::<_MM_HINT_T0>(slot as *const State as *const i8);
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = slot;
}
