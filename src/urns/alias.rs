//! Urn based on the alias method, with online repair
//!
//! The classic alias method gives O(1) draws but needs an O(num_colors)
//! rebuild after every update. This urn relaxes the alias invariant instead:
//! each color owns one table row whose total weight is allowed to drift
//! within a corridor around the average. Updates only touch the affected row;
//! when a row leaves the corridor the urn first tries to repair it locally by
//! swapping alias slots with a few random partner rows, and only rebuilds the
//! whole table when that fails.

use super::Urn;
use crate::protocol::State;

use rand::Rng;

/// One alias row: `weights[0]` balls of the owning color, `weights[1]` balls
/// of `color2`.
#[derive(Clone, Copy, Debug, Default)]
struct Row {
    weights: [i64; 2],
    color2: State,
}

impl Row {
    #[inline]
    fn total_weight(&self) -> i64 {
        self.weights[0] + self.weights[1]
    }
}

/// Alias-method urn with lazily repaired rows.
#[derive(Clone, Debug)]
pub struct AliasUrn {
    num_balls: i64,
    lower_threshold: f64,
    upper_threshold: f64,

    rows: Vec<Row>,
    balls_with_color: Vec<i64>,

    // Scratch buffers for table construction, kept to avoid reallocation
    small_rows: Vec<State>,
    large_rows: Vec<State>,

    /// Corridor of acceptable row weights, derived from the average at the
    /// last rebuild
    row_weight_lower: i64,
    row_weight_upper: i64,
    /// Largest row total the rejection sampler must accommodate
    row_current_max: i64,
}

impl AliasUrn {
    /// Default corridor around the average row weight.
    const LOWER_THRESHOLD: f64 = 0.8;
    const UPPER_THRESHOLD: f64 = 1.5;

    /// Number of random partner rows tried before giving up on a local repair.
    const REPAIR_ATTEMPTS: u32 = 5;

    /// Build an empty urn with a custom repair corridor.
    pub fn with_thresholds(num_colors: usize, lower: f64, upper: f64) -> Self {
        assert!(num_colors > 0, "urn needs at least one color");
        assert!(lower < 1.0);
        assert!(upper > 1.0);
        Self {
            num_balls: 0,
            lower_threshold: lower,
            upper_threshold: upper,
            rows: vec![Row::default(); num_colors],
            balls_with_color: vec![0; num_colors],
            small_rows: Vec::new(),
            large_rows: Vec::new(),
            row_weight_lower: 0,
            row_weight_upper: 0,
            row_current_max: 0,
        }
    }

    /// Draw a ball, returning the row it was found in and the slot within
    /// that row alongside its color.
    fn draw_slot<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, State, usize) {
        assert!(!self.is_empty(), "drawing from an empty urn");
        let span = self.num_colors() as i64 * self.row_current_max;
        loop {
            let variate = rng.gen_range(0..span);
            let row_id = (variate / self.row_current_max) as usize;
            let mut offset = variate % self.row_current_max;

            let row = &self.rows[row_id];
            if offset < row.weights[0] {
                return (row_id, row_id, 0);
            }
            offset -= row.weights[0];
            if offset < row.weights[1] {
                return (row_id, row.color2, 1);
            }
            // Landed in the dead zone of a row below the maximum: redraw
        }
    }

    /// Try to bring `row_id` back into the weight corridor by swapping alias
    /// slots with randomly chosen partner rows.
    fn try_fix_row(&mut self, row_id: usize, mut next_partner: impl FnMut() -> usize) -> bool {
        for _ in 0..Self::REPAIR_ATTEMPTS {
            let partner_id = next_partner();
            if partner_id == row_id {
                continue;
            }

            let row = self.rows[row_id];
            let partner = self.rows[partner_id];
            let w1 = row.weights[0] + partner.weights[1];
            let w2 = row.weights[1] + partner.weights[0];

            if self.row_weight_lower < w1
                && self.row_weight_lower < w2
                && w1 < self.row_weight_upper
                && w2 < self.row_weight_upper
            {
                let (a, b) = (row_id, partner_id);
                let tmp = (self.rows[a].weights[1], self.rows[a].color2);
                self.rows[a].weights[1] = self.rows[b].weights[1];
                self.rows[a].color2 = self.rows[b].color2;
                self.rows[b].weights[1] = tmp.0;
                self.rows[b].color2 = tmp.1;
                return true;
            }
        }
        false
    }

    /// Repair entry point for update paths that carry no generator: partner
    /// rows are drawn from a SplitMix64 sequence seeded by the broken row.
    fn try_fix_row_deterministic(&mut self, row_id: usize) -> bool {
        let row = self.rows[row_id];
        let mut state = (row_id as u64)
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add((row.weights[0] as u64).wrapping_mul(0xbf58476d1ce4e5b9))
            ^ (row.weights[1] as u64).wrapping_mul(0x94d049bb133111eb);
        let num_colors = self.num_colors() as u64;
        self.try_fix_row(row_id, move || {
            state = split_mix_64(state);
            (state % num_colors) as usize
        })
    }

    /// Rebuild the whole alias table from the per-color counts using the
    /// classic small/large categorization.
    fn rebuild(&mut self) {
        let num_colors = self.num_colors();
        self.assert_consistency(true);

        // Categorize rows by whether they exceed the floored average
        let average_floored = self.num_balls / num_colors as i64;
        self.small_rows.clear();
        self.large_rows.clear();
        for (color, &n) in self.balls_with_color.iter().enumerate() {
            if n > average_floored {
                self.large_rows.push(color);
            } else {
                self.small_rows.push(color);
            }
            self.rows[color] = Row {
                weights: [n, 0],
                color2: 0,
            };
        }

        // Distribute the excess weight of large rows into the free space of
        // small rows. The first `num_above_avg` rows filled end up one above
        // the average, the rest exactly at it.
        let mut num_above_avg = self.num_balls - average_floored * num_colors as i64;
        self.row_weight_lower = (average_floored as f64 * self.lower_threshold) as i64;
        self.row_current_max = average_floored + (num_above_avg > 0) as i64;
        self.row_weight_upper = (self.row_current_max as f64 * self.upper_threshold).ceil() as i64;

        while let Some(&large_id) = self.large_rows.last() {
            let small_id = self
                .small_rows
                .pop()
                .expect("alias table construction ran out of donor rows");

            let target = average_floored + (num_above_avg > 0) as i64;
            num_above_avg -= 1;

            let remaining = target - self.rows[small_id].weights[0];
            if remaining == 0 {
                continue;
            }

            debug_assert!(self.rows[large_id].weights[0] >= remaining);
            self.rows[large_id].weights[0] -= remaining;
            self.rows[small_id].weights[1] = remaining;
            self.rows[small_id].color2 = large_id;

            if self.rows[large_id].weights[0] <= average_floored {
                self.large_rows.pop();
                self.small_rows.push(large_id);
            }
        }
        self.small_rows.clear();

        self.assert_consistency(false);
    }

    fn assert_consistency(&self, ignore_rows: bool) {
        if cfg!(debug_assertions) {
            let sum_counts: i64 = self.balls_with_color.iter().sum();
            assert_eq!(sum_counts, self.num_balls);

            if !ignore_rows {
                let sum_rows: i64 = self.rows.iter().map(Row::total_weight).sum();
                assert_eq!(sum_rows, self.num_balls);
                assert!(self
                    .rows
                    .iter()
                    .all(|row| row.total_weight() <= self.row_current_max));
                assert!(self
                    .rows
                    .iter()
                    .all(|row| row.weights[1] == 0 || row.color2 < self.num_colors()));
            }
        }
    }
}

/// SplitMix64 mixing step, used to derive repair partner sequences.
#[inline]
fn split_mix_64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

impl Urn for AliasUrn {
    fn new(num_colors: usize) -> Self {
        Self::with_thresholds(num_colors, Self::LOWER_THRESHOLD, Self::UPPER_THRESHOLD)
    }

    fn num_colors(&self) -> usize {
        self.rows.len()
    }

    fn total(&self) -> u64 {
        self.num_balls as u64
    }

    fn count(&self, color: State) -> u64 {
        self.balls_with_color[color] as u64
    }

    fn add_balls(&mut self, color: State, n: u64) {
        let n = n as i64;
        self.rows[color].weights[0] += n;
        self.balls_with_color[color] += n;
        self.num_balls += n;

        let new_weight = self.rows[color].total_weight();
        if self.row_current_max < new_weight {
            self.row_current_max = new_weight;
        }

        self.assert_consistency(false);

        if new_weight < self.row_weight_lower || self.row_weight_upper < new_weight {
            if !self.try_fix_row_deterministic(color) {
                self.rebuild();
            }
        }
    }

    fn remove_balls(&mut self, color: State, n: u64) {
        assert!(
            n as i64 <= self.balls_with_color[color],
            "removing more balls than present"
        );
        let n = n as i64;
        self.rows[color].weights[0] -= n;
        self.balls_with_color[color] -= n;
        self.num_balls -= n;

        // A negative owner slot would corrupt the rejection sampler, so a
        // removal that overshoots the slot always forces a full rebuild.
        let row = self.rows[color];
        if row.weights[0] < 0 {
            self.rebuild();
        } else if row.total_weight() < self.row_weight_lower
            || self.row_weight_upper < row.total_weight()
        {
            if !self.try_fix_row_deterministic(color) {
                self.rebuild();
            }
        }
    }

    fn clear(&mut self) {
        self.rows.fill(Row::default());
        self.balls_with_color.fill(0);
        self.num_balls = 0;
        self.row_weight_lower = 0;
        self.row_weight_upper = 0;
        self.row_current_max = 0;
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        self.draw_slot(rng).1
    }

    fn draw_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> State {
        let (row_id, color, slot) = self.draw_slot(rng);

        self.balls_with_color[color] -= 1;
        self.num_balls -= 1;
        self.rows[row_id].weights[slot] -= 1;

        self.assert_consistency(false);

        if self.rows[row_id].total_weight() < self.row_weight_lower {
            let num_colors = self.num_colors();
            if !self.try_fix_row(row_id, || rng.gen_range(0..num_colors)) {
                self.rebuild();
            }
        }

        color
    }

    fn add_urn(&mut self, other: &Self) {
        assert_eq!(self.num_colors(), other.num_colors());
        for (mine, theirs) in self.balls_with_color.iter_mut().zip(&other.balls_with_color) {
            *mine += theirs;
        }
        self.num_balls += other.num_balls;
        self.rebuild();
    }

    fn bulk_add(&mut self, color: State, n: u64) {
        self.balls_with_color[color] += n as i64;
        self.num_balls += n as i64;
    }

    fn bulk_commit(&mut self) {
        self.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::DefaultEngine;
    use rand::SeedableRng;

    #[test]
    fn rebuild_balances_rows() {
        let mut urn = AliasUrn::new(5);
        for (color, n) in [(0, 100u64), (1, 1), (2, 40), (3, 3), (4, 6)] {
            urn.bulk_add(color, n);
        }
        urn.bulk_commit();

        let average = 150 / 5;
        for row in &urn.rows {
            let total = row.total_weight();
            assert!(total == average || total == average + 1, "row weight {}", total);
        }
        let table_total: i64 = urn.rows.iter().map(Row::total_weight).sum();
        assert_eq!(table_total, 150);
    }

    #[test]
    fn counts_survive_update_churn() {
        let mut rng = DefaultEngine::seed_from_u64(17);
        let mut urn = AliasUrn::new(8);
        let mut expected = [0u64; 8];

        for step in 0..5_000 {
            if step % 3 != 0 || urn.is_empty() {
                let color = rng.gen_range(0..8);
                urn.add_balls(color, 1 + step % 5);
                expected[color] += 1 + step % 5;
            } else {
                let color = urn.draw_and_remove(&mut rng);
                assert!(expected[color] > 0);
                expected[color] -= 1;
            }
        }

        for (color, &n) in expected.iter().enumerate() {
            assert_eq!(urn.count(color), n);
        }
        assert_eq!(urn.total(), expected.iter().sum::<u64>());
    }
}
