//! The simulation engines
//!
//! All engines share one execution model: a protocol plus an initial urn
//! builds a simulator, whose `run` loop performs interactions in epochs and
//! hands control to a monitor callback between epochs. The monitor inspects
//! the simulator through read-only accessors and decides whether to continue.
//! The engines differ in how they realize an epoch, from one interaction at a
//! time up to jointly sampling thousands of non-colliding interactions.

mod batch;
mod distribution;
mod population;

pub use self::batch::BatchSimulator;
pub use self::distribution::DistributionSimulator;
pub use self::population::PopulationSimulator;

use crate::urns::Urn;

use std::borrow::Cow;

/// The surface every simulation engine exposes to monitors and harnesses.
pub trait Simulator {
    /// Urn type used to expose the agents' state distribution.
    type Urn: Urn;

    /// Simulate epochs until the monitor returns false. The monitor runs
    /// synchronously between epochs; the engine never suspends mid-epoch.
    fn run(&mut self, monitor: impl FnMut(&Self) -> bool);

    /// The current distribution of agent states. Borrowed where the engine
    /// keeps an urn anyway, computed on the fly otherwise.
    fn agents(&self) -> Cow<'_, Self::Urn>;

    /// Number of agents being simulated. Constant over a run.
    fn num_agents(&self) -> u64;

    /// Interactions performed so far.
    fn num_interactions(&self) -> u64;

    /// Epochs completed so far.
    fn num_epochs(&self) -> u64;

    /// Collision-free runs sampled so far. Zero for engines that do not work
    /// in runs.
    fn num_runs(&self) -> u64;

    /// The epoch length the engine is currently aiming for.
    fn target_epoch_length(&self) -> u64;
}
