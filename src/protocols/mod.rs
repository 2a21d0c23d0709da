//! Ready-made protocols
//!
//! The simulators do not care what a protocol computes; these implementations
//! exist for the demo harnesses, the benchmarks and the test suites.

mod clock;
mod increment;
mod leader;
mod majority;
mod random_matrix;

pub use self::clock::ClockProtocol;
pub use self::increment::{
    IncrementBoth, IncrementFirst, IncrementOneWay, IncrementSecond, IncrementTwoWay,
};
pub use self::leader::LeaderElectionProtocol;
pub use self::majority::{MajorityProtocol, Opinion};
pub use self::random_matrix::{RandomProtocolOneWay, RandomProtocolTwoWay};
