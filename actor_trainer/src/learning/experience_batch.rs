//! Per-round aggregate of actor submissions.

use crate::messages::{AgentId, Experience, PeerId, PerformanceReport, TransitionBatch};
use std::collections::BTreeMap;

/// One actor's contribution to a round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorReport {
    pub experience: Experience,
    pub performance: PerformanceReport,
}

/// Experience and performance of every actor for one training round.
///
/// Built from a completed submission quorum and consumed once by
/// [`LearningStep::train_on_batch`](super::LearningStep::train_on_batch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceBatch {
    round: u64,
    reports: BTreeMap<PeerId, ActorReport>,
}

impl ExperienceBatch {
    /// Empty batch for `round` (1-based, the round this batch will complete).
    pub fn new(round: u64) -> Self {
        Self {
            round,
            reports: BTreeMap::new(),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Add or replace an actor's report. Returns the replaced report.
    pub fn insert(&mut self, actor: PeerId, report: ActorReport) -> Option<ActorReport> {
        self.reports.insert(actor, report)
    }

    pub fn get(&self, actor: &PeerId) -> Option<&ActorReport> {
        self.reports.get(actor)
    }

    /// Number of reporting actors.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reporting actors in id order.
    pub fn actors(&self) -> impl Iterator<Item = &PeerId> {
        self.reports.keys()
    }

    pub fn reports(&self) -> impl Iterator<Item = (&PeerId, &ActorReport)> {
        self.reports.iter()
    }

    /// Performance of each actor, in id order.
    pub fn performances(&self) -> impl Iterator<Item = (PeerId, PerformanceReport)> + '_ {
        self.reports.iter().map(|(p, r)| (*p, r.performance))
    }

    /// Total transitions across actors and agents.
    pub fn transitions(&self) -> usize {
        self.reports.values().map(|r| r.experience.transitions()).sum()
    }

    /// Concatenate every actor's transitions per agent, actors in id order.
    pub fn merged(&self) -> BTreeMap<AgentId, TransitionBatch> {
        let mut merged: BTreeMap<AgentId, TransitionBatch> = BTreeMap::new();
        for report in self.reports.values() {
            for (agent_id, batch) in &report.experience.per_agent {
                merged.entry(agent_id.clone()).or_default().extend(batch);
            }
        }
        merged
    }
}
