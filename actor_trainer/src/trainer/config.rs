//! Trainer protocol configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Completed rounds between target soft updates.
    pub target_update_frequency: usize,
    /// Blend factor for target soft updates, in `[0, 1]`.
    pub tau: f32,
    /// Register the synchronous action-serving handler.
    pub serve_actions: bool,
    /// How long a dispatcher thread waits on the mailbox before re-checking
    /// the shutdown flag, in milliseconds.
    pub dispatch_poll_interval_ms: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            target_update_frequency: 1,
            tau: 1.0,
            serve_actions: false,
            dispatch_poll_interval_ms: 100,
        }
    }
}

impl TrainerConfig {
    /// Create config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of rounds between target updates.
    ///
    /// # Panics
    ///
    /// Panics if `frequency` is 0.
    pub fn with_target_update_frequency(mut self, frequency: usize) -> Self {
        assert!(frequency > 0, "target_update_frequency must be > 0");
        self.target_update_frequency = frequency;
        self
    }

    /// Set the soft update blend factor.
    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    /// Enable or disable the action-serving handler.
    pub fn with_serve_actions(mut self, serve: bool) -> Self {
        self.serve_actions = serve;
        self
    }

    /// Set the dispatcher poll interval, rounded up to whole milliseconds.
    pub fn with_dispatch_poll_interval(mut self, interval: Duration) -> Self {
        let ms = interval.as_nanos().div_ceil(1_000_000);
        self.dispatch_poll_interval_ms = u64::try_from(ms).unwrap_or(u64::MAX);
        self
    }

    pub fn dispatch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_interval_ms)
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.target_update_frequency == 0 {
            return Err("target_update_frequency must be > 0");
        }
        if !self.tau.is_finite() || !(0.0..=1.0).contains(&self.tau) {
            return Err("tau must be within [0, 1]");
        }
        if self.dispatch_poll_interval_ms == 0 {
            return Err("dispatch_poll_interval_ms must be > 0");
        }
        Ok(())
    }
}
