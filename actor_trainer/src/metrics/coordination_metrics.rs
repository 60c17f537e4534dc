//! Shared counters for the pattern registry and the trainer protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe coordination metrics.
#[derive(Debug, Default)]
pub struct CoordinationMetrics {
    /// Messages accepted into a buffer
    messages_buffered: AtomicUsize,
    /// Completed quorums (handler invocations)
    quorums_fired: AtomicUsize,
    /// Messages rejected as duplicate source
    duplicates_rejected: AtomicUsize,
    /// Messages with no matching registration
    unroutable_dropped: AtomicUsize,
    /// Handler invocations that returned an error
    handler_failures: AtomicUsize,
    /// Completed training rounds
    rounds_trained: AtomicUsize,
    /// Target model soft updates triggered
    target_updates: AtomicUsize,
    /// Action queries answered
    queries_served: AtomicUsize,
    /// Replies that could not be delivered
    replies_failed: AtomicUsize,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_buffered: usize,
    pub quorums_fired: usize,
    pub duplicates_rejected: usize,
    pub unroutable_dropped: usize,
    pub handler_failures: usize,
    pub rounds_trained: usize,
    pub target_updates: usize,
    pub queries_served: usize,
    pub replies_failed: usize,
}

impl CoordinationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_buffered(&self) {
        self.messages_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quorum(&self) {
        self.quorums_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unroutable(&self) {
        self.unroutable_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round(&self) {
        self.rounds_trained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_target_update(&self) {
        self.target_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` answered queries.
    pub fn add_queries_served(&self, n: usize) {
        self.queries_served.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_reply_failure(&self) {
        self.replies_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn quorums_fired(&self) -> usize {
        self.quorums_fired.load(Ordering::Relaxed)
    }

    pub fn duplicates_rejected(&self) -> usize {
        self.duplicates_rejected.load(Ordering::Relaxed)
    }

    pub fn unroutable_dropped(&self) -> usize {
        self.unroutable_dropped.load(Ordering::Relaxed)
    }

    pub fn rounds_trained(&self) -> usize {
        self.rounds_trained.load(Ordering::Relaxed)
    }

    pub fn target_updates(&self) -> usize {
        self.target_updates.load(Ordering::Relaxed)
    }

    pub fn queries_served(&self) -> usize {
        self.queries_served.load(Ordering::Relaxed)
    }

    /// Read every counter.
    ///
    /// Counters are loaded independently, so a snapshot taken while messages
    /// are in flight is not a consistent cut.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_buffered: self.messages_buffered.load(Ordering::Relaxed),
            quorums_fired: self.quorums_fired.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            unroutable_dropped: self.unroutable_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            rounds_trained: self.rounds_trained.load(Ordering::Relaxed),
            target_updates: self.target_updates.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            replies_failed: self.replies_failed.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.messages_buffered,
            &self.quorums_fired,
            &self.duplicates_rejected,
            &self.unroutable_dropped,
            &self.handler_failures,
            &self.rounds_trained,
            &self.target_updates,
            &self.queries_served,
            &self.replies_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Shared coordination metrics.
pub type SharedCoordinationMetrics = Arc<CoordinationMetrics>;

/// Create new shared coordination metrics.
pub fn coordination_metrics() -> SharedCoordinationMetrics {
    Arc::new(CoordinationMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = CoordinationMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_counts() {
        let metrics = CoordinationMetrics::new();
        metrics.record_buffered();
        metrics.record_buffered();
        metrics.record_quorum();
        metrics.record_duplicate();
        metrics.add_queries_served(4);

        let snap = metrics.snapshot();
        assert_eq!(snap.messages_buffered, 2);
        assert_eq!(snap.quorums_fired, 1);
        assert_eq!(snap.duplicates_rejected, 1);
        assert_eq!(snap.queries_served, 4);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = CoordinationMetrics::new();
        metrics.record_round();
        metrics.record_target_update();
        metrics.record_unroutable();

        metrics.reset();

        assert_eq!(metrics.rounds_trained(), 0);
        assert_eq!(metrics.target_updates(), 0);
        assert_eq!(metrics.unroutable_dropped(), 0);
    }

    #[test]
    fn test_shared_metrics() {
        let metrics = coordination_metrics();
        let metrics2 = Arc::clone(&metrics);

        metrics.record_round();
        metrics2.record_round();

        assert_eq!(metrics.rounds_trained(), 2);
    }
}
