//! Hypergeometric sampling
//!
//! The without-replacement machinery of the urns and of the batch simulator
//! reduces to one primitive: "out of `red + others` balls, `draws` are taken
//! without replacement, how many are red?". The heavy lifting is done by the
//! `rand_distr` implementation of the H2PE rejection algorithm, which stays
//! exact and fast across the whole population range this crate targets.

use rand::Rng;
use rand_distr::{Distribution, Hypergeometric};

/// Draw the number of red balls obtained when sampling `draws` balls without
/// replacement from an urn containing `red` red and `others` non-red balls.
///
/// Requires `draws <= red + others`; violating this is a programming error.
pub fn hypergeometric<R: Rng + ?Sized>(rng: &mut R, red: u64, others: u64, draws: u64) -> u64 {
    let total = red
        .checked_add(others)
        .expect("hypergeometric population overflows u64");
    assert!(draws <= total, "cannot draw {} out of {} balls", draws, total);

    // Degenerate cases are frequent in the urn scan loops; short-circuit them
    // before paying the sampler setup cost.
    if red == 0 || draws == 0 {
        return 0;
    }
    if others == 0 {
        return draws;
    }
    if draws == total {
        return red;
    }

    let distribution = Hypergeometric::new(total, red, draws)
        .expect("hypergeometric parameters rejected despite being in range");
    distribution.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::DefaultEngine;
    use rand::SeedableRng;

    #[test]
    fn degenerate_cases() {
        let mut rng = DefaultEngine::seed_from_u64(3);
        assert_eq!(hypergeometric(&mut rng, 0, 10, 5), 0);
        assert_eq!(hypergeometric(&mut rng, 10, 0, 5), 5);
        assert_eq!(hypergeometric(&mut rng, 10, 10, 0), 0);
        assert_eq!(hypergeometric(&mut rng, 3, 7, 10), 3);
    }

    #[test]
    fn samples_stay_in_support() {
        let mut rng = DefaultEngine::seed_from_u64(4);
        for _ in 0..10_000 {
            let drawn = hypergeometric(&mut rng, 30, 70, 25);
            assert!(drawn <= 25);
            assert!(drawn <= 30);
        }
    }

    #[test]
    fn mean_matches_expectation() {
        let mut rng = DefaultEngine::seed_from_u64(5);
        let (red, others, draws) = (400u64, 600u64, 100u64);
        let rounds = 20_000;
        let total: u64 = (0..rounds)
            .map(|_| hypergeometric(&mut rng, red, others, draws))
            .sum();
        let mean = total as f64 / rounds as f64;

        // E[X] = draws * red / (red + others) = 40, sd of the mean ~ 0.03
        assert!((mean - 40.0).abs() < 0.5, "mean = {}", mean);
    }

    #[test]
    fn handles_huge_populations() {
        let mut rng = DefaultEngine::seed_from_u64(6);
        let red = 4_000_000_000u64;
        let others = 6_000_000_000u64;
        let drawn = hypergeometric(&mut rng, red, others, 1_000_000);
        assert!(drawn <= 1_000_000);
        // Far away from the tails for these parameters
        assert!(drawn > 300_000 && drawn < 500_000, "drawn = {}", drawn);
    }
}
