//! Coordination metrics.
//!
//! - [`CoordinationMetrics`]: lock-free counters for registry and trainer events
//! - [`SharedCoordinationMetrics`]: Arc wrapper shared by dispatch threads

pub mod coordination_metrics;

pub use coordination_metrics::{
    coordination_metrics, CoordinationMetrics, MetricsSnapshot, SharedCoordinationMetrics,
};
