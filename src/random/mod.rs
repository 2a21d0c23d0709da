//! Random number generation. All samplers in this crate are generic over a
//! `rand` engine; this module fixes the default engine and hosts the small
//! helpers built directly on top of raw generator words.

mod async_engine;
mod fair_coin;

pub use self::async_engine::AsyncRandomEngine;
pub use self::fair_coin::FairCoin;

use rand::distributions::OpenClosed01;
use rand::Rng;

/// Random number generation engine in use.
///
/// Xoshiro256+ is cheap and has plenty of state for this workload. Its weak
/// low bits only reach consumers through [`FairCoin`], which mixes whole
/// words anyway.
pub type DefaultEngine = rand_xoshiro::Xoshiro256Plus;

/// Sample a uniform number from the half-open unit interval `(0, 1]`.
///
/// The collision distribution takes the logarithm of this value, so exact
/// zeros must never be produced. Exact ones are harmless and map to the
/// smallest possible variate.
#[inline]
pub fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.sample(OpenClosed01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn open_unit_stays_in_interval() {
        let mut rng = DefaultEngine::seed_from_u64(1);
        for _ in 0..100_000 {
            let u = open_unit(&mut rng);
            assert!(u > 0.0 && u <= 1.0);
        }
    }
}
