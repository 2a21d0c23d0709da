//! Urn indexed by a complete binary tree

use super::{BulkSampling, Urn};
use crate::protocol::State;

use rand::Rng;

/// Urn whose counts are indexed by a complete binary tree, making both
/// updates and draws O(log num_colors).
///
/// The tree is stored as a 1-indexed heap: node `i` has children `2i` and
/// `2i + 1`, the leaves start at `first_leaf` (the number of colors rounded
/// up to a power of two) and leaf `first_leaf + c` holds the ball count of
/// color `c`. Each internal node stores the number of balls in its *left*
/// subtree only. A draw then walks from the root, comparing the remaining
/// random value against the left sum at each node; the removing variant
/// additionally decrements the left sum whenever it descends left, which
/// keeps the index consistent without a second pass.
#[derive(Clone, Debug)]
pub struct TreeUrn {
    num_colors: usize,
    first_leaf: usize,
    /// Heap nodes; `nodes[i - 1]` is tree node `i`
    nodes: Vec<i64>,
    num_balls: i64,
}

impl TreeUrn {
    #[inline]
    fn leaf_slot(&self, color: State) -> usize {
        self.first_leaf + color - 1
    }

    /// Recompute every internal node from the leaf counts.
    ///
    /// Walking the nodes in decreasing index order, each node's accumulated
    /// value is pushed to the nearest ancestor whose left subtree contains
    /// it; that ancestor is found by stripping the trailing one bits plus one
    /// from the index.
    fn rebuild(&mut self) {
        self.nodes[..self.first_leaf - 1].fill(0);
        for i in (2..=self.nodes.len()).rev() {
            let parent = i >> (i.trailing_ones() + 1);
            if parent == 0 {
                continue;
            }
            self.nodes[parent - 1] += self.nodes[i - 1];
        }
    }

    /// Update the count of `color` by `delta`, adjusting the left sums on the
    /// path to the root.
    fn update(&mut self, color: State, delta: i64) {
        debug_assert!(color < self.num_colors);
        let mut i = self.first_leaf + color;
        while i > 1 {
            let parent = i / 2;
            if i & 1 == 0 {
                self.nodes[parent - 1] += delta;
            }
            i = parent;
        }
        let slot = self.leaf_slot(color);
        self.nodes[slot] += delta;
        self.num_balls += delta;
    }
}

impl Urn for TreeUrn {
    fn new(num_colors: usize) -> Self {
        assert!(num_colors > 0, "urn needs at least one color");
        let first_leaf = num_colors.next_power_of_two();
        Self {
            num_colors,
            first_leaf,
            nodes: vec![0; first_leaf + num_colors],
            num_balls: 0,
        }
    }

    fn num_colors(&self) -> usize {
        self.num_colors
    }

    fn total(&self) -> u64 {
        self.num_balls as u64
    }

    fn count(&self, color: State) -> u64 {
        self.nodes[self.leaf_slot(color)] as u64
    }

    fn add_balls(&mut self, color: State, n: u64) {
        self.update(color, n as i64);
    }

    fn remove_balls(&mut self, color: State, n: u64) {
        assert!(n <= self.count(color), "removing more balls than present");
        self.update(color, -(n as i64));
    }

    fn clear(&mut self) {
        self.nodes.fill(0);
        self.num_balls = 0;
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        assert!(!self.is_empty(), "drawing from an empty urn");
        let mut variate = rng.gen_range(0..self.num_balls);
        let mut i = 1;
        while i < self.first_leaf {
            let left_sum = self.nodes[i - 1];
            let to_right = variate >= left_sum;
            if to_right {
                variate -= left_sum;
            }
            i = 2 * i + to_right as usize;
        }
        i - self.first_leaf
    }

    fn draw_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> State {
        assert!(!self.is_empty(), "drawing from an empty urn");
        let mut variate = rng.gen_range(0..self.num_balls);
        let mut i = 1;
        while i < self.first_leaf {
            let left_sum = self.nodes[i - 1];
            let to_right = variate >= left_sum;
            if to_right {
                variate -= left_sum;
            } else {
                // A ball will disappear from the left subtree
                self.nodes[i - 1] = left_sum - 1;
            }
            i = 2 * i + to_right as usize;
        }
        self.nodes[i - 1] -= 1;
        self.num_balls -= 1;
        i - self.first_leaf
    }

    fn add_urn(&mut self, other: &Self) {
        assert_eq!(self.num_colors(), other.num_colors());
        // Identical layout, so the whole index can be merged elementwise
        for (mine, theirs) in self.nodes.iter_mut().zip(&other.nodes) {
            *mine += theirs;
        }
        self.num_balls += other.num_balls;
    }

    fn from_counts(counts: &[u64]) -> Self {
        let mut urn = Self::new(counts.len());
        for (color, &n) in counts.iter().enumerate() {
            let slot = urn.leaf_slot(color);
            urn.nodes[slot] = n as i64;
            urn.num_balls += n as i64;
        }
        urn.rebuild();
        urn
    }
}

impl BulkSampling for TreeUrn {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::DefaultEngine;
    use rand::SeedableRng;

    #[test]
    fn rebuild_agrees_with_incremental_updates() {
        let counts = [3u64, 0, 7, 1, 0, 0, 5, 2, 9];
        let bulk = TreeUrn::from_counts(&counts);

        let mut incremental = TreeUrn::new(counts.len());
        for (color, &n) in counts.iter().enumerate() {
            incremental.add_balls(color, n);
        }

        assert_eq!(bulk.nodes, incremental.nodes);
        assert_eq!(bulk.total(), 27);
    }

    #[test]
    fn removing_draw_keeps_index_consistent() {
        let mut rng = DefaultEngine::seed_from_u64(11);
        let mut urn = TreeUrn::from_counts(&[5, 3, 0, 8, 2]);
        let mut expected = [5u64, 3, 0, 8, 2];

        while !urn.is_empty() {
            let color = urn.draw_and_remove(&mut rng);
            assert!(expected[color] > 0, "drew color {} with no balls left", color);
            expected[color] -= 1;
            for (c, &n) in expected.iter().enumerate() {
                assert_eq!(urn.count(c), n);
            }
        }
    }
}
