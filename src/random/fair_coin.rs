//! Batched generation of uniform random bits

use rand::Rng;

/// Generator of fair coin flips that consumes one engine word per 64 flips.
///
/// Behaves like sampling a Bernoulli(0.5) distribution on every call, but
/// amortizes the cost of the underlying engine by buffering a full 64-bit
/// word and handing out its bits one at a time.
#[derive(Clone, Debug, Default)]
pub struct FairCoin {
    buffer: u64,
    bits_left: u32,
}

impl FairCoin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the coin, refilling the bit buffer from `rng` when it runs dry.
    #[inline]
    pub fn flip<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.bits_left == 0 {
            self.buffer = rng.gen();
            self.bits_left = 64;
        }
        let result = self.buffer & 1 == 1;
        self.buffer >>= 1;
        self.bits_left -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::DefaultEngine;
    use rand::SeedableRng;

    #[test]
    fn consumes_one_word_per_64_flips() {
        let mut rng = DefaultEngine::seed_from_u64(42);
        let mut reference = rng.clone();
        let mut coin = FairCoin::new();

        for _ in 0..3 {
            let mut word: u64 = reference.gen();
            for _ in 0..64 {
                assert_eq!(coin.flip(&mut rng), word & 1 == 1);
                word >>= 1;
            }
        }
        // Both generators must have advanced in lockstep
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn flips_are_balanced() {
        let mut rng = DefaultEngine::seed_from_u64(7);
        let mut coin = FairCoin::new();
        let num_flips = 1_000_000;
        let heads = (0..num_flips).filter(|_| coin.flip(&mut rng)).count();

        // 6 sigma tolerance around the mean of a fair binomial
        let mean = num_flips as f64 / 2.0;
        let sigma = (num_flips as f64 / 4.0).sqrt();
        assert!((heads as f64 - mean).abs() < 6.0 * sigma, "heads = {}", heads);
    }
}
