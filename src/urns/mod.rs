//! Urn data structures
//!
//! An urn is a multiset of colored balls: one color per agent state, one ball
//! per agent. Since balls of equal color are indistinguishable, urns store
//! per-color counts rather than individual balls, which shifts the cost of
//! most operations from the number of agents to the much smaller number of
//! states. The implementations differ only in how they trade update cost
//! against sampling cost.

mod alias;
mod linear;
mod tree;
mod weighted;

pub use self::alias::AliasUrn;
pub use self::linear::LinearUrn;
pub use self::tree::TreeUrn;
pub use self::weighted::WeightedUrn;

use crate::hypergeometric::hypergeometric;
use crate::protocol::State;

use rand::Rng;

/// The operations every urn supports.
///
/// Counts are non-negative and `total()` always equals the sum of all
/// per-color counts. Drawing from an empty urn or removing more balls than a
/// color holds is a programming error and aborts.
pub trait Urn: Clone {
    /// Build an empty urn over `num_colors` colors.
    fn new(num_colors: usize) -> Self;

    fn num_colors(&self) -> usize;

    /// Total number of balls across all colors.
    fn total(&self) -> u64;

    /// Number of balls of the given color.
    fn count(&self, color: State) -> u64;

    fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Add `n` balls of the given color.
    fn add_balls(&mut self, color: State, n: u64);

    /// Remove `n` balls of the given color. Requires `n <= count(color)`.
    fn remove_balls(&mut self, color: State, n: u64);

    /// Remove all balls, keeping the color range.
    fn clear(&mut self);

    /// Pick a ball uniformly at random and return its color.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> State;

    /// Like [`draw`](Urn::draw), but also removes the picked ball.
    fn draw_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> State;

    /// Add every ball of `other` to this urn. Both urns must range over the
    /// same number of colors.
    fn add_urn(&mut self, other: &Self);

    /// Insertion that may defer internal index maintenance until
    /// [`bulk_commit`](Urn::bulk_commit). Sampling between a `bulk_add` and
    /// the following `bulk_commit` is undefined. Urns without deferred
    /// construction treat this as a plain [`add_balls`](Urn::add_balls).
    fn bulk_add(&mut self, color: State, n: u64) {
        self.add_balls(color, n);
    }

    /// Finish a sequence of [`bulk_add`](Urn::bulk_add) calls.
    fn bulk_commit(&mut self) {}

    /// Build an urn holding `counts[c]` balls of each color `c`.
    fn from_counts(counts: &[u64]) -> Self {
        let mut urn = Self::new(counts.len());
        for (color, &n) in counts.iter().enumerate() {
            if n > 0 {
                urn.bulk_add(color, n);
            }
        }
        urn.bulk_commit();
        urn
    }
}

/// Without-replacement sampling of whole ball batches.
///
/// Both operations choose exactly `k` balls as if drawing them one by one
/// without replacement, but report them as one `(color, multiplicity)`
/// callback per color, in increasing color order. The scan draws one
/// conditional hypergeometric variate per color, so its cost is independent
/// of `k`. With `report_empty`, colors that contributed no ball are reported
/// with multiplicity zero as well.
pub trait BulkSampling: Urn {
    /// Sample `k` balls without replacement, leaving the urn untouched.
    /// Requires `k <= total()`.
    fn sample_without_replacement<R: Rng + ?Sized>(
        &self,
        k: u64,
        rng: &mut R,
        report_empty: bool,
        mut callback: impl FnMut(State, u64),
    ) {
        if self.is_empty() || k == 0 {
            return;
        }
        assert!(k <= self.total(), "cannot sample {} of {} balls", k, self.total());

        let mut left = k;
        let mut unconsidered = self.total();
        for color in 0..self.num_colors() {
            if left == 0 {
                if !report_empty {
                    break;
                }
                callback(color, 0);
                continue;
            }
            let here = self.count(color);
            unconsidered -= here;
            let selected = conditional_draw(rng, here, unconsidered, left);
            left -= selected;
            if report_empty || selected > 0 {
                callback(color, selected);
            }
        }
    }

    /// Sample `k` balls without replacement and remove them from the urn.
    /// The callback observes the urn with the balls already removed.
    fn remove_random<R: Rng + ?Sized>(
        &mut self,
        k: u64,
        rng: &mut R,
        report_empty: bool,
        mut callback: impl FnMut(State, u64),
    ) {
        if self.is_empty() || k == 0 {
            return;
        }
        assert!(k <= self.total(), "cannot remove {} of {} balls", k, self.total());

        let mut left = k;
        let mut unconsidered = self.total();
        for color in 0..self.num_colors() {
            if left == 0 {
                if !report_empty {
                    break;
                }
                callback(color, 0);
                continue;
            }
            let here = self.count(color);
            unconsidered -= here;
            let selected = conditional_draw(rng, here, unconsidered, left);
            left -= selected;
            if selected > 0 {
                self.remove_balls(color, selected);
            }
            if report_empty || selected > 0 {
                callback(color, selected);
            }
        }
    }
}

/// One step of the color scan: how many of the `left` remaining samples land
/// on a color with `here` balls, given `unconsidered` balls in later colors.
#[inline]
fn conditional_draw<R: Rng + ?Sized>(rng: &mut R, here: u64, unconsidered: u64, left: u64) -> u64 {
    if here == 0 {
        0
    } else if unconsidered == 0 {
        left.min(here)
    } else {
        hypergeometric(rng, here, unconsidered, left)
    }
}
