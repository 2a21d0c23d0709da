//! Baseline urn with a dense count vector

use super::{BulkSampling, Urn};
use crate::protocol::State;

use rand::Rng;

/// The straightforward urn: a dense vector of per-color counts.
///
/// Updates are O(1); a draw scans the prefix sums and is O(num_colors), which
/// is perfectly fine as long as the number of states stays small compared to
/// the number of agents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedUrn {
    balls_with_color: Vec<u64>,
    num_balls: u64,
}

impl WeightedUrn {
    /// Per-color counts, indexed by color.
    pub fn counts(&self) -> &[u64] {
        &self.balls_with_color
    }
}

impl Urn for WeightedUrn {
    fn new(num_colors: usize) -> Self {
        assert!(num_colors > 0, "urn needs at least one color");
        Self {
            balls_with_color: vec![0; num_colors],
            num_balls: 0,
        }
    }

    fn num_colors(&self) -> usize {
        self.balls_with_color.len()
    }

    fn total(&self) -> u64 {
        self.num_balls
    }

    fn count(&self, color: State) -> u64 {
        self.balls_with_color[color]
    }

    fn add_balls(&mut self, color: State, n: u64) {
        self.balls_with_color[color] += n;
        self.num_balls += n;
    }

    fn remove_balls(&mut self, color: State, n: u64) {
        assert!(
            n <= self.balls_with_color[color],
            "removing {} balls of color {} but only {} present",
            n,
            color,
            self.balls_with_color[color]
        );
        self.balls_with_color[color] -= n;
        self.num_balls -= n;
    }

    fn clear(&mut self) {
        self.balls_with_color.fill(0);
        self.num_balls = 0;
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        assert!(!self.is_empty(), "drawing from an empty urn");
        let mut variate = rng.gen_range(0..self.num_balls);
        for (color, &n) in self.balls_with_color.iter().enumerate() {
            if variate < n {
                return color;
            }
            variate -= n;
        }
        unreachable!("ball counts out of sync with total")
    }

    fn draw_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> State {
        let color = self.draw(rng);
        self.balls_with_color[color] -= 1;
        self.num_balls -= 1;
        color
    }

    fn add_urn(&mut self, other: &Self) {
        assert_eq!(self.num_colors(), other.num_colors());
        for (mine, theirs) in self.balls_with_color.iter_mut().zip(&other.balls_with_color) {
            *mine += theirs;
        }
        self.num_balls += other.num_balls;
    }
}

impl BulkSampling for WeightedUrn {}
