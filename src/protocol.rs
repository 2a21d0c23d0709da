//! The protocol abstraction: how a pair of agent states is rewritten when the
//! two agents meet, plus the transition-table precomputations the simulators
//! rely on.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// An agent state. Protocols interpret it; the simulators treat it as an
/// opaque color in `[0, num_states)`.
pub type State = usize;

/// A population protocol: a rewriting rule applied to pairs of agent states.
///
/// Deterministic protocols implement [`apply`](Protocol::apply). Randomized
/// protocols set `DETERMINISTIC = false` and override
/// [`apply_bulk`](Protocol::apply_bulk) instead; the simulators then request
/// many independent applications of the same state pair in one call.
///
/// One-way protocols never modify the second (passive) agent. Their `apply`
/// must return the second state unchanged, which lets the simulators elide
/// the write-back and enables the partitioned bulk path of the batch
/// simulator.
pub trait Protocol {
    /// The transition is a pure function of the state pair.
    const DETERMINISTIC: bool;

    /// The second agent's state is never modified.
    const ONE_WAY: bool;

    /// Number of distinct states this protocol operates on.
    fn num_states(&self) -> State;

    /// Transition a single pair of states.
    ///
    /// One-way protocols return the second state unchanged.
    fn apply(&mut self, first: State, second: State) -> (State, State) {
        let _ = (first, second);
        unimplemented!("randomized protocols answer through apply_bulk")
    }

    /// Apply the transition to `count` independent pairs that all start in
    /// `(first, second)`, reporting the output states with multiplicities via
    /// `emit`. The total emitted multiplicity must be `2 * count`, or `count`
    /// for one-way protocols (the unchanged second agents are the caller's
    /// concern).
    fn apply_bulk(
        &mut self,
        first: State,
        second: State,
        count: u64,
        mut emit: impl FnMut(State, u64),
    ) {
        debug_assert!(
            Self::DETERMINISTIC,
            "randomized protocols must override apply_bulk"
        );
        let (a, b) = self.apply(first, second);
        emit(a, count);
        if !Self::ONE_WAY {
            emit(b, count);
        }
    }
}

/// Transition a single pair of states, dispatching between the deterministic
/// and the randomized protocol interface.
pub fn transition<P: Protocol>(protocol: &mut P, pair: (State, State)) -> (State, State) {
    if P::DETERMINISTIC {
        let out = protocol.apply(pair.0, pair.1);
        debug_assert!(
            !P::ONE_WAY || out.1 == pair.1,
            "one-way protocol modified the passive agent"
        );
        out
    } else {
        let mut out = [pair.0, pair.1];
        let mut written = 0;
        protocol.apply_bulk(pair.0, pair.1, 1, |state, multiplicity| {
            match multiplicity {
                0 => {}
                1 => {
                    assert!(written < 2, "protocol emitted more than two output states");
                    out[written] = state;
                    written += 1;
                }
                2 => {
                    assert!(written == 0, "protocol emitted more than two output states");
                    out = [state, state];
                    written = 2;
                }
                n => panic!("protocol emitted multiplicity {} for a single interaction", n),
            }
        });
        if P::ONE_WAY {
            assert!(written == 1, "one-way protocol must emit exactly one output state");
            (out[0], pair.1)
        } else {
            assert!(written == 2, "protocol must emit exactly two output states");
            (out[0], out[1])
        }
    }
}

/// Whether `(from.0, from.1) -> (to.0, to.1)` leaves the pair unchanged, up to
/// swapping the two agents.
fn is_no_op(from: (State, State), to: (State, State)) -> bool {
    from == to || (from.0 == to.1 && from.1 == to.0)
}

/// Enumerate all state pairs whose transition is a no-op up to agent swap.
///
/// Returns one sorted list of second states per first state, plus the total
/// number of no-op pairs. The batch simulator uses the lists to elide
/// transitions that cannot change the population, and the total to decide
/// whether that is worth the bookkeeping.
pub fn transitions_without_change<P: Protocol>(
    protocol: &mut P,
    num_states: State,
) -> (Vec<Vec<State>>, usize) {
    let mut skip_transitions = vec![Vec::new(); num_states];
    let mut skips = 0;
    for first in 0..num_states {
        for second in 0..num_states {
            let from = (first, second);
            if is_no_op(from, transition(protocol, from)) {
                skip_transitions[first].push(second);
                skips += 1;
            }
        }
    }
    (skip_transitions, skips)
}

/// For each first state, the partition of all second states by the image of
/// the first state, stored as `(preimage_states, image_state)` groups.
pub type OneWayPartitions = Vec<Vec<(Vec<State>, State)>>;

/// Group the columns of a one-way protocol's transition table by the state the
/// first agent is mapped to.
pub fn partition_oneway_transitions<P: Protocol>(
    protocol: &mut P,
    num_states: State,
) -> OneWayPartitions {
    let mut mapping = Vec::with_capacity(num_states);
    for first in 0..num_states {
        let mut row_map: BTreeMap<State, Vec<State>> = BTreeMap::new();
        for second in 0..num_states {
            let to = transition(protocol, (first, second));
            debug_assert_eq!(to.1, second);
            row_map.entry(to.0).or_default().push(second);
        }
        mapping.push(
            row_map
                .into_iter()
                .map(|(image, preimages)| (preimages, image))
                .collect(),
        );
    }
    mapping
}

/// Render the full transition table as text, one row per first state. No-op
/// entries are marked with a trailing `.` so they stand out when eyeballing a
/// protocol.
pub fn transition_matrix<P: Protocol>(protocol: &mut P, num_states: State) -> String {
    let width = (num_states as f64 + 1.0).log10().ceil() as usize;
    let mut out = String::new();
    for first in 0..num_states {
        for second in 0..num_states {
            let from = (first, second);
            let to = transition(protocol, from);
            let marker = if is_no_op(from, to) { '.' } else { ' ' };
            if P::ONE_WAY {
                let _ = write!(out, "{:width$}{} ", to.0, marker, width = width);
            } else {
                let _ = write!(
                    out,
                    "({:width$},{:width$}){} ",
                    to.0,
                    to.1,
                    marker,
                    width = width
                );
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (x, y) -> (y, x): every transition is a no-op up to swap
    struct Swap;
    impl Protocol for Swap {
        const DETERMINISTIC: bool = true;
        const ONE_WAY: bool = false;
        fn num_states(&self) -> State {
            3
        }
        fn apply(&mut self, first: State, second: State) -> (State, State) {
            (second, first)
        }
    }

    /// One-way protocol mapping the first agent to second % 2
    struct Parity;
    impl Protocol for Parity {
        const DETERMINISTIC: bool = true;
        const ONE_WAY: bool = true;
        fn num_states(&self) -> State {
            4
        }
        fn apply(&mut self, _first: State, second: State) -> (State, State) {
            (second % 2, second)
        }
    }

    #[test]
    fn swap_is_all_skips() {
        let (rows, skips) = transitions_without_change(&mut Swap, 3);
        assert_eq!(skips, 9);
        for (first, row) in rows.iter().enumerate() {
            assert_eq!(row, &[0, 1, 2], "row {}", first);
        }
    }

    #[test]
    fn parity_partitions_by_image() {
        let partitions = partition_oneway_transitions(&mut Parity, 4);
        for row in &partitions {
            assert_eq!(row.len(), 2);
            assert_eq!(row[0], (vec![0, 2], 0));
            assert_eq!(row[1], (vec![1, 3], 1));
        }
    }

    #[test]
    fn bulk_default_multiplies_deterministic_outputs() {
        let mut seen = Vec::new();
        Swap.apply_bulk(1, 2, 7, |state, n| seen.push((state, n)));
        assert_eq!(seen, vec![(2, 7), (1, 7)]);

        seen.clear();
        Parity.apply_bulk(0, 3, 5, |state, n| seen.push((state, n)));
        assert_eq!(seen, vec![(1, 5)]);
    }

    #[test]
    fn transition_checks_one_way_invariant() {
        assert_eq!(transition(&mut Parity, (3, 2)), (0, 2));
        assert_eq!(transition(&mut Swap, (3, 2)), (2, 3));
    }
}
