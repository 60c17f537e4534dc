//! Performance bookkeeping across training rounds.
//!
//! # Data Integrity
//!
//! Non-finite rewards (NaN, Inf) are counted but excluded from every average,
//! so one misbehaving actor cannot poison the lifetime statistics.

use super::experience_batch::ExperienceBatch;

/// Aggregate of one round's performance reports.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundPerformance {
    pub round: u64,
    /// Actors that reported.
    pub actors: usize,
    /// Mean finite total reward across actors (0.0 if none were finite).
    pub mean_reward: f32,
    /// Best finite total reward, if any.
    pub best_reward: Option<f32>,
    /// Environment steps summed across actors.
    pub steps: usize,
}

/// Lifetime and last-round performance statistics.
///
/// Uses Welford's incremental mean for the lifetime average.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTracker {
    reports: usize,
    valid_reports: usize,
    filtered_reports: usize,
    mean_reward: f32,
    total_steps: usize,
    last_round: Option<RoundPerformance>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a single actor's total reward and step count.
    pub fn record(&mut self, total_reward: f32, steps: usize) {
        self.reports += 1;
        self.total_steps = self.total_steps.saturating_add(steps);

        if !total_reward.is_finite() {
            self.filtered_reports += 1;
            return;
        }

        self.valid_reports += 1;
        let delta = total_reward - self.mean_reward;
        self.mean_reward += delta / self.valid_reports as f32;
    }

    /// Record every actor's report in `batch` and summarize the round.
    pub fn record_round(&mut self, batch: &ExperienceBatch) -> RoundPerformance {
        let mut finite = Vec::with_capacity(batch.len());
        let mut steps = 0usize;
        for (_, report) in batch.performances() {
            self.record(report.total_reward, report.steps);
            steps = steps.saturating_add(report.steps);
            if report.total_reward.is_finite() {
                finite.push(report.total_reward);
            }
        }

        let mean_reward = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f32>() / finite.len() as f32
        };
        let summary = RoundPerformance {
            round: batch.round(),
            actors: batch.len(),
            mean_reward,
            best_reward: finite.iter().copied().reduce(f32::max),
            steps,
        };
        self.last_round = Some(summary);
        summary
    }

    /// Lifetime mean of finite rewards.
    pub fn mean_reward(&self) -> f32 {
        self.mean_reward
    }

    pub fn reports(&self) -> usize {
        self.reports
    }

    pub fn filtered_reports(&self) -> usize {
        self.filtered_reports
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn last_round(&self) -> Option<RoundPerformance> {
        self.last_round
    }
}
