//! popsim: simulation engines for population protocols
//!
//!
//! # Introduction (for the distributed-computing person)
//!
//! A population protocol is a minimal model of distributed computation: a
//! large crowd of anonymous agents, each holding one of finitely many states,
//! interacts in uniformly random pairs, and every interaction rewrites the
//! two states through a fixed rule. Despite the simplicity, such systems
//! compute interesting things (leader election, majority, phase clocks), and
//! the interesting questions are asymptotic, which means simulating billions
//! of interactions per run.
//!
//!
//! # Introduction (for the numerical person)
//!
//! Since agents of equal state are exchangeable, the population is just a
//! multiset of states, and an interaction is two draws from an urn followed
//! by two insertions. Everything here revolves around doing that faster than
//! the naive loop: urns with logarithmic or constant-time sampling, and a
//! batch engine that samples the joint outcome of thousands of interactions
//! through the distribution of the time until a pair overlaps with an
//! already-touched agent.
//!
//!
//! # Structure
//!
//! * [`urns`] holds the multiset implementations with uniform and
//!   without-replacement sampling.
//! * [`sim`] holds the three engines: per-distribution, per-agent and batch.
//! * [`protocol`] defines the transition-rule interface the engines consume;
//!   [`protocols`] ships concrete rules.
//! * [`collision`], [`epoch`], [`hypergeometric`] and [`random`] are the
//!   sampling underpinnings of the batch engine.
//! * [`monitor`] is the round-based reporting glue used by the binaries.

pub mod collision;
pub mod epoch;
pub mod hypergeometric;
pub mod monitor;
pub mod protocol;
pub mod protocols;
pub mod random;
pub mod sim;
pub mod urns;

pub use crate::protocol::{Protocol, State};
pub use crate::sim::{BatchSimulator, DistributionSimulator, PopulationSimulator, Simulator};
pub use crate::urns::{AliasUrn, BulkSampling, LinearUrn, TreeUrn, Urn, WeightedUrn};
