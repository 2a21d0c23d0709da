//! Sampling the number of interactions until the next collision
//!
//! Consider an urn with `n` balls, `g` of them red and the rest green. Every
//! draw takes one ball uniformly at random and puts a red ball back in its
//! place. Let X be the number of draws until the first red ball is seen. The
//! batch simulator uses X as the length of a run of interactions that touch
//! only fresh agents: red balls stand for agents that already interacted in
//! the current epoch.
//!
//! Sampling inverts the CDF of X. With `u` uniform on the unit interval, the
//! variate is the integer root of
//!
//! ```text
//! f(k) = ln(u) - lnGamma(n - g) + lnGamma(n - g - k) + k * ln(n)
//! ```
//!
//! which is increasing in `k`. Root finding is accelerated by precomputed
//! bracket tables: for each of 16 red-count buckets and 64 uniform buckets, a
//! conservative `[low, high]` interval is computed once at construction using
//! the extremal parameters of the bucket. A second table subdivides the
//! lowest uniform bucket another 64 times, since tiny uniforms land in the
//! far tail where brackets from the coarse table are loose.

use crate::random;

use rand::Rng;
use statrs::function::gamma::ln_gamma;

const NUM_STAGES: usize = 16;
const NUM_ESTIMATES: usize = 64;

type Bracket = (i64, i64);
type StageTable = [[Bracket; NUM_ESTIMATES]; NUM_STAGES];

/// Inverse-CDF sampler for the strict collision distribution.
pub struct CollisionDistribution {
    n: i64,
    n_green: i64,

    stages: Box<StageTable>,
    small_stages: Box<StageTable>,

    ln_gamma_n_green: f64,
    log_n: f64,
    stage_factor: f64,
    current_stage: usize,
}

impl CollisionDistribution {
    /// Set up the sampler for a population of `n` balls, initially `g` of
    /// them red. Bracket tables cover red counts up to `max_g`.
    pub fn new(n: i64, g: i64, max_g: i64) -> Self {
        assert!(n > 0, "collision distribution needs a non-empty population");

        let log_n = (n as f64).ln();
        let stage_factor = max_g as f64 / NUM_STAGES as f64;

        let mut sampler = Self {
            n,
            n_green: n,
            stages: Box::new([[(0, 0); NUM_ESTIMATES]; NUM_STAGES]),
            small_stages: Box::new([[(0, 0); NUM_ESTIMATES]; NUM_STAGES]),
            ln_gamma_n_green: 0.0,
            log_n,
            stage_factor,
            current_stage: 0,
        };
        sampler.set_red(g);

        for stage in 0..NUM_STAGES {
            // Extremal red counts within this bucket; evaluating the target
            // function at both ends makes the brackets conservative.
            let red_lower = (stage as f64 * stage_factor) as i64;
            let red_upper = (((stage + 1) as f64 * stage_factor) as i64 + 1).min(max_g);
            let at_most = TargetFunction::for_red(red_upper, n, log_n);
            let at_least = TargetFunction::for_red(red_lower, n, log_n);

            for i in 0..NUM_ESTIMATES {
                let rand_lower = (i as f64 / NUM_ESTIMATES as f64).max(f64::MIN_POSITIVE);
                let rand_upper = (i + 1) as f64 / NUM_ESTIMATES as f64;

                sampler.stages[stage][i] = (
                    bisection(&at_most.with_uniform(rand_upper), 0, n + 1),
                    bisection(&at_least.with_uniform(rand_lower), 0, n + 1) + 1,
                );
                debug_assert!(sampler.stages[stage][i].0 <= sampler.stages[stage][i].1);
            }

            for i in 0..NUM_ESTIMATES {
                let subdivision = (NUM_ESTIMATES * NUM_ESTIMATES) as f64;
                let rand_lower = (i as f64 / subdivision).max(f64::MIN_POSITIVE);
                let rand_upper = (i + 1) as f64 / subdivision;

                sampler.small_stages[stage][i] = (
                    bisection(&at_most.with_uniform(rand_upper), 0, n + 1),
                    bisection(&at_least.with_uniform(rand_lower), 0, n + 1) + 1,
                );
                debug_assert!(sampler.small_stages[stage][i].0 <= sampler.small_stages[stage][i].1);
            }
        }

        sampler
    }

    /// Update the current red count, selecting the matching bracket bucket.
    pub fn set_red(&mut self, g: i64) {
        assert!(g <= self.n);
        self.current_stage = if self.stage_factor > 0.0 {
            ((g as f64 / self.stage_factor) as usize).min(NUM_STAGES - 1)
        } else {
            0
        };
        self.n_green = self.n - g;
        self.ln_gamma_n_green = ln_gamma(self.n_green as f64);
    }

    /// Sample a variate for the current red count.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.inverse_cdf(random::open_unit(rng))
    }

    /// Map a uniform `u` from `(0, 1]` to the matching variate.
    pub fn inverse_cdf(&self, uniform: f64) -> i64 {
        assert!(uniform > 0.0 && uniform <= 1.0);

        // The lowest coarse bucket is too wide for the tail, so it gets its
        // own subdivided table. Brackets from that table may still be loose
        // enough that regula falsi degenerates, hence the bisection override.
        let mut force_bisection = false;
        let limits = if uniform * (NUM_ESTIMATES as f64) < 1.0 {
            force_bisection = true;
            let i = (uniform * (NUM_ESTIMATES * NUM_ESTIMATES) as f64) as usize;
            self.small_stages[self.current_stage][i.min(NUM_ESTIMATES - 1)]
        } else {
            let i = (uniform * NUM_ESTIMATES as f64) as usize;
            self.stages[self.current_stage][i.min(NUM_ESTIMATES - 1)]
        };

        let f = TargetFunction::new(uniform, self.n_green, self.ln_gamma_n_green, self.log_n);

        let result = if self.n_green < 1_000_000 || force_bisection {
            bisection(&f, limits.0, limits.1)
        } else {
            regula_falsi(&f, limits.0, limits.1)
        };

        debug_assert!(result >= limits.0);
        debug_assert!(result <= limits.1);
        result
    }

    pub fn population(&self) -> i64 {
        self.n
    }
}

/// The function whose integer root is the sampled variate.
struct TargetFunction {
    /// `ln(u) - lnGamma(n_green)`
    target: f64,
    log_n: f64,
    n_green: f64,
}

impl TargetFunction {
    fn new(uniform: f64, n_green: i64, ln_gamma_n_green: f64, log_n: f64) -> Self {
        Self {
            target: uniform.ln() - ln_gamma_n_green,
            log_n,
            n_green: n_green as f64,
        }
    }

    /// Partially applied variant used during table construction.
    fn for_red(red: i64, n: i64, log_n: f64) -> PartialTarget {
        PartialTarget {
            n_green: n - red,
            ln_gamma_n_green: ln_gamma((n - red) as f64),
            log_n,
        }
    }

    #[inline]
    fn eval(&self, k: f64) -> f64 {
        let rest = self.n_green - k;
        if rest <= 0.0 {
            // The true function diverges to +inf at k = n_green; saturating
            // keeps the root finders moving in the right direction without
            // feeding lnGamma a non-positive argument.
            return f64::INFINITY;
        }
        self.target + ln_gamma(rest) + k * self.log_n
    }
}

struct PartialTarget {
    n_green: i64,
    ln_gamma_n_green: f64,
    log_n: f64,
}

impl PartialTarget {
    fn with_uniform(&self, uniform: f64) -> TargetFunction {
        TargetFunction::new(uniform, self.n_green, self.ln_gamma_n_green, self.log_n)
    }
}

/// Integer bisection: largest `k` in `[left, right)` with `f(k) <= 0`.
fn bisection(f: &TargetFunction, mut left: i64, mut right: i64) -> i64 {
    debug_assert!(left <= right);
    while left + 1 < right {
        let mid = left + (right - left) / 2;
        if f.eval(mid as f64) > 0.0 {
            right = mid;
        } else {
            left = mid;
        }
    }
    left
}

/// Regula falsi with a bisection fallback, for the smooth regime where the
/// bracket is wide and function evaluations are expensive.
fn regula_falsi(f: &TargetFunction, left: i64, right: i64) -> i64 {
    if left + 1 >= right {
        return left;
    }

    // One bisection step buys the second endpoint evaluation for free
    let (mut x0, mut f0, mut x1, mut f1);
    {
        let mid = left + (right - left) / 2;
        let value = f.eval(mid as f64);
        if value < 0.0 {
            x0 = mid as f64;
            f0 = value;
            x1 = right as f64;
            f1 = f.eval(x1);
        } else {
            x0 = left as f64;
            f0 = f.eval(x0);
            x1 = mid as f64;
            f1 = value;
        }
    }

    if f0 == 0.0 {
        return left;
    }

    for _ in 0..15 {
        if x0 + 1.0 >= x1 {
            return x0 as i64;
        }
        debug_assert!(x0 < x1);
        debug_assert!(f0 < 0.0 && f1 >= 0.0);

        let new_x = (x0 * f1 - x1 * f0) / (f1 - f0);
        if !(x0 < new_x && new_x < x1) {
            break;
        }

        let new_f = f.eval(new_x);
        if new_f < 0.0 {
            x0 = new_x;
            f0 = new_f;
        } else {
            x1 = new_x;
            f1 = new_f;
        }
    }

    bisection(f, x0 as i64, right.min(x1 as i64 + 1))
}
