//! Protocols with randomly generated transition tables
//!
//! Used by the benchmark harness to exercise the simulators on transition
//! structure that carries no exploitable regularity, and by equivalence tests
//! that compare engines against each other.

use crate::protocol::{Protocol, State};

use rand::Rng;

/// One-way protocol with a uniformly random transition table.
#[derive(Clone, Debug)]
pub struct RandomProtocolOneWay {
    num_states: State,
    transitions: Vec<State>,
}

impl RandomProtocolOneWay {
    pub fn new<R: Rng>(rng: &mut R, num_states: State) -> Self {
        let transitions = (0..num_states * num_states)
            .map(|_| rng.gen_range(0..num_states))
            .collect();
        Self {
            num_states,
            transitions,
        }
    }
}

impl Protocol for RandomProtocolOneWay {
    const DETERMINISTIC: bool = true;
    const ONE_WAY: bool = true;

    fn num_states(&self) -> State {
        self.num_states
    }

    fn apply(&mut self, first: State, second: State) -> (State, State) {
        debug_assert!(first < self.num_states && second < self.num_states);
        (self.transitions[first * self.num_states + second], second)
    }
}

/// Two-way protocol with a uniformly random transition table.
#[derive(Clone, Debug)]
pub struct RandomProtocolTwoWay {
    num_states: State,
    transitions: Vec<(State, State)>,
}

impl RandomProtocolTwoWay {
    pub fn new<R: Rng>(rng: &mut R, num_states: State) -> Self {
        let transitions = (0..num_states * num_states)
            .map(|_| (rng.gen_range(0..num_states), rng.gen_range(0..num_states)))
            .collect();
        Self {
            num_states,
            transitions,
        }
    }
}

impl Protocol for RandomProtocolTwoWay {
    const DETERMINISTIC: bool = true;
    const ONE_WAY: bool = false;

    fn num_states(&self) -> State {
        self.num_states
    }

    fn apply(&mut self, first: State, second: State) -> (State, State) {
        debug_assert!(first < self.num_states && second < self.num_states);
        self.transitions[first * self.num_states + second]
    }
}
