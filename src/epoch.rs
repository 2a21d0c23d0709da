//! Online tuning of the batch simulator's epoch length
//!
//! Longer epochs amortize the fixed per-epoch work better, shorter epochs
//! keep the collision bookkeeping cheap; the sweet spot depends on the
//! machine and on the protocol. Rather than modelling that, the controller
//! measures: it cycles through three trial lengths around the best known
//! value, measures wall-clock throughput for each, and recenters on the
//! winner.

use std::time::Instant;

/// Trial phases, in measurement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Below = 0,
    Current = 1,
    Above = 2,
}

impl Phase {
    fn scale(self) -> f64 {
        1.0 + (self as i64 - 1) as f64 * 0.1
    }
}

/// Hill-climbing controller for the target epoch length.
pub struct EpochLengthController {
    min: u64,
    max: u64,
    current_best: u64,
    current_trial: u64,

    phase: Phase,
    throughput: [f64; 3],

    epochs_done: u64,
    epochs_per_phase: u64,

    measure_started: Instant,
    phase_started: Instant,
    interactions_at_measure_start: u64,
}

impl EpochLengthController {
    /// How long one full measurement phase should take.
    const TARGET_MS_PER_PHASE: f64 = 60.0;
    /// Weight of the old value when recalibrating the phase length.
    const CALIBRATION_BIAS: f64 = 0.8;

    /// Initialize the search window from the population size: epochs between
    /// `n^0.4` and `n^0.8`, starting at `n^0.6`.
    pub fn new(num_agents: u64) -> Self {
        let n = num_agents as f64;
        let min = n.powf(0.4) as u64 + 1;
        let max = (n.powf(0.8) as u64 + 1).min(num_agents);
        let current_best = (n.powf(0.6) as u64 + 1).min(max);

        let now = Instant::now();
        Self {
            min,
            max,
            current_best,
            current_trial: current_best,
            phase: Phase::Below,
            throughput: [0.0; 3],
            epochs_done: 0,
            epochs_per_phase: 10,
            measure_started: now,
            phase_started: now,
            interactions_at_measure_start: 0,
        }
    }

    /// Begin measuring. Called once when the simulation run starts.
    pub fn start(&mut self) {
        self.phase = Phase::Below;
        let now = Instant::now();
        self.measure_started = now;
        self.phase_started = now;
        self.current_trial = self.trial_value(Phase::Below);
    }

    /// Account for one finished epoch; `num_interactions` is the simulator's
    /// running interaction total.
    pub fn update(&mut self, num_interactions: u64) {
        if self.epochs_done < self.epochs_per_phase {
            self.epochs_done += 1;
            return;
        }
        self.epochs_done = 0;

        // Close the measurement for the current trial value
        let now = Instant::now();
        let elapsed = now.duration_since(self.measure_started).as_secs_f64();
        let progress = (num_interactions - self.interactions_at_measure_start) as f64;
        self.throughput[self.phase as usize] = progress / elapsed;
        self.measure_started = now;
        self.interactions_at_measure_start = num_interactions;

        match self.phase {
            Phase::Below => self.phase = Phase::Current,
            Phase::Current => self.phase = Phase::Above,
            Phase::Above => {
                // All three measurements are in; recenter on the best. The
                // reverse iteration makes ties resolve to the earliest phase,
                // since max_by keeps the last of equal elements.
                let best = match self
                    .throughput
                    .iter()
                    .enumerate()
                    .rev()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                {
                    Some(1) => Phase::Current,
                    Some(2) => Phase::Above,
                    _ => Phase::Below,
                };
                self.current_best = self.trial_value(best);
                self.phase = Phase::Below;

                // Pull the phase duration towards the target
                let phase_ms = self
                    .measure_started
                    .duration_since(self.phase_started)
                    .as_secs_f64()
                    * 1e3;
                let correction = Self::CALIBRATION_BIAS
                    + (1.0 - Self::CALIBRATION_BIAS) * Self::TARGET_MS_PER_PHASE / phase_ms;
                self.epochs_per_phase = ((self.epochs_per_phase as f64 * correction) as u64).max(10);

                self.phase_started = self.measure_started;
            }
        }

        self.current_trial = self.trial_value(self.phase);
    }

    fn trial_value(&self, phase: Phase) -> u64 {
        ((self.current_best as f64 * phase.scale()) as u64).clamp(self.min, self.max)
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// The epoch length currently on trial; the simulator sizes its next
    /// epoch with this.
    pub fn current(&self) -> u64 {
        self.current_trial
    }

    /// The best epoch length found so far.
    pub fn current_best(&self) -> u64 {
        self.current_best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_window_matches_population() {
        let controller = EpochLengthController::new(1_000_000);
        assert_eq!(controller.min(), 252);
        assert_eq!(controller.max(), 63_096);
        assert_eq!(controller.current_best(), 3_982);
        assert!(controller.current() >= controller.min());
        assert!(controller.current() <= controller.max());
    }

    #[test]
    fn window_is_clamped_for_tiny_populations() {
        let controller = EpochLengthController::new(4);
        assert!(controller.max() <= 4);
        assert!(controller.current_best() <= controller.max());
        assert!(controller.min() >= 1);
    }

    #[test]
    fn trials_stay_within_bounds_and_rotate() {
        let mut controller = EpochLengthController::new(10_000);
        controller.start();

        let mut interactions = 0;
        let mut seen = Vec::new();
        for _ in 0..100 {
            interactions += controller.current();
            seen.push(controller.current());
            controller.update(interactions);
        }

        assert!(seen.iter().all(|&len| len >= controller.min()));
        assert!(seen.iter().all(|&len| len <= controller.max()));
        // With the initial phase length of 10, three phases complete within
        // 100 epochs, so at least two distinct trial values must show up
        let distinct: std::collections::BTreeSet<_> = seen.iter().collect();
        assert!(distinct.len() >= 2, "trials = {:?}", distinct);
    }
}
