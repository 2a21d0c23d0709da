//! Round-based progress reporting and termination
//!
//! Monitors are plain callbacks invoked by the simulators between epochs.
//! This module provides the standard one used by the demo harnesses: it
//! reports throughput figures every few rounds (a round is one interaction
//! per agent), forwards the simulator to a user callback, and stops the
//! simulation after a bounded number of rounds or when the callback asks
//! for it.

use crate::sim::Simulator;

use std::time::Instant;

/// Handle through which a report callback can end the simulation.
pub struct MonitorSignal {
    keep_running: bool,
}

impl MonitorSignal {
    /// Gracefully stop the simulation after the current epoch.
    pub fn stop_simulation(&mut self) {
        self.keep_running = false;
    }
}

/// Monitor that reports every `rounds_between_reports` rounds and terminates
/// after `termination_round` rounds (0 meaning never).
pub struct RoundBasedMonitor<F> {
    callback: F,

    termination_round: u64,
    next_report_round: u64,
    rounds_between_reports: u64,
    keep_running: bool,

    started: Instant,
    last_report: Instant,
    interactions_at_last_report: u64,
    epochs_at_last_report: u64,
    runs_at_last_report: u64,
}

impl<F> RoundBasedMonitor<F> {
    pub fn new(rounds_between_reports: u64, termination_round: u64, callback: F) -> Self {
        let now = Instant::now();
        Self {
            callback,
            termination_round,
            next_report_round: if rounds_between_reports > 0 {
                rounds_between_reports
            } else {
                u64::MAX
            },
            rounds_between_reports,
            keep_running: true,
            started: now,
            last_report: now,
            interactions_at_last_report: 0,
            epochs_at_last_report: 0,
            runs_at_last_report: 0,
        }
    }

    /// Inspect the simulator after an epoch; the return value tells the
    /// simulator whether to continue. Pass this to [`Simulator::run`] as
    /// `|sim| monitor.observe(sim)`.
    pub fn observe<S: Simulator>(&mut self, sim: &S) -> bool
    where
        F: FnMut(&S, &mut MonitorSignal),
    {
        let round = sim.num_interactions() / sim.num_agents();

        if self.termination_round > 0 && round >= self.termination_round {
            self.report(sim);
            let mut signal = MonitorSignal { keep_running: true };
            (self.callback)(sim, &mut signal);
            self.keep_running = false;
        } else if self.next_report_round <= round {
            self.report(sim);
            let mut signal = MonitorSignal { keep_running: true };
            (self.callback)(sim, &mut signal);
            if !signal.keep_running {
                println!("Stopped prematurely as requested by reporter callback");
                self.keep_running = false;
            }
            self.next_report_round += self.rounds_between_reports;
        }

        self.keep_running
    }

    fn report<S: Simulator>(&mut self, sim: &S) {
        let now = Instant::now();
        let elapsed_total = now.duration_since(self.started).as_secs_f64() * 1e3;
        let elapsed_last = now.duration_since(self.last_report).as_secs_f64() * 1e3;
        let through_total = sim.num_interactions() as f64 / elapsed_total / 1e3;
        let through_last = (sim.num_interactions() - self.interactions_at_last_report) as f64
            / elapsed_last
            / 1e3;

        let elapsed_epochs = (sim.num_epochs() - self.epochs_at_last_report).max(1);
        let elapsed_runs = sim.num_runs() - self.runs_at_last_report;
        self.epochs_at_last_report = sim.num_epochs();
        self.runs_at_last_report = sim.num_runs();

        let num_agents = sim.num_agents();
        println!(
            "Round: {:8}. Elapsed time",
            sim.num_interactions() / num_agents
        );
        println!(
            " since start {:10.1}ms ({:10.1} interact/us)",
            elapsed_total, through_total
        );
        println!(
            " since last  {:10.1}ms ({:10.1} interact/us)",
            elapsed_last, through_last
        );
        println!(
            " epoch target length n^{:.2} runs per epoch {:4}",
            (sim.target_epoch_length() as f64).ln() / (num_agents as f64).ln(),
            (elapsed_runs as f64 / elapsed_epochs as f64).round() as u64
        );

        self.last_report = now;
        self.interactions_at_last_report = sim.num_interactions();
    }
}
