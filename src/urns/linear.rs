//! Linear-scan urn with signed counts

use super::Urn;
use crate::protocol::State;

use rand::Rng;

/// Same layout and sampling strategy as [`WeightedUrn`](super::WeightedUrn),
/// but on signed 64-bit counts. Kept as a distinct type so that benchmark
/// results remain comparable between the count representations.
#[derive(Clone, Debug)]
pub struct LinearUrn {
    balls: Vec<i64>,
    num_balls: i64,
}

impl Urn for LinearUrn {
    fn new(num_colors: usize) -> Self {
        assert!(num_colors > 0, "urn needs at least one color");
        Self {
            balls: vec![0; num_colors],
            num_balls: 0,
        }
    }

    fn num_colors(&self) -> usize {
        self.balls.len()
    }

    fn total(&self) -> u64 {
        self.num_balls as u64
    }

    fn count(&self, color: State) -> u64 {
        self.balls[color] as u64
    }

    fn add_balls(&mut self, color: State, n: u64) {
        self.balls[color] += n as i64;
        self.num_balls += n as i64;
    }

    fn remove_balls(&mut self, color: State, n: u64) {
        assert!(n as i64 <= self.balls[color], "removing more balls than present");
        self.balls[color] -= n as i64;
        self.num_balls -= n as i64;
    }

    fn clear(&mut self) {
        self.balls.fill(0);
        self.num_balls = 0;
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        assert!(!self.is_empty(), "drawing from an empty urn");
        let mut variate = rng.gen_range(0..self.num_balls);
        let mut color = 0;
        loop {
            if self.balls[color] > variate {
                return color;
            }
            variate -= self.balls[color];
            color += 1;
        }
    }

    fn draw_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> State {
        let color = self.draw(rng);
        self.balls[color] -= 1;
        self.num_balls -= 1;
        color
    }

    fn add_urn(&mut self, other: &Self) {
        assert_eq!(self.num_colors(), other.num_colors());
        for (mine, theirs) in self.balls.iter_mut().zip(&other.balls) {
            *mine += theirs;
        }
        self.num_balls += other.num_balls;
    }
}
