//! Payload schemas carried by actor/trainer messages.
//!
//! # Data Integrity
//!
//! Transition batches are column-oriented. [`TransitionBatch::is_consistent`]
//! checks that every column has the same number of rows; the agent manager
//! refuses to train on inconsistent batches rather than silently truncating.

use super::message::MessageTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a learning agent served by the trainer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Column-oriented batch of transitions for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionBatch {
    /// Observed states, one row per transition.
    pub states: Vec<Vec<f32>>,
    /// Actions taken, one row per transition.
    pub actions: Vec<Vec<f32>>,
    /// Rewards received.
    pub rewards: Vec<f32>,
    /// Successor states.
    pub next_states: Vec<Vec<f32>>,
}

impl TransitionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single transition.
    pub fn push(&mut self, state: Vec<f32>, action: Vec<f32>, reward: f32, next_state: Vec<f32>) {
        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.next_states.push(next_state);
    }

    /// Append all rows of `other` after the rows of `self`.
    pub fn extend(&mut self, other: &TransitionBatch) {
        self.states.extend(other.states.iter().cloned());
        self.actions.extend(other.actions.iter().cloned());
        self.rewards.extend_from_slice(&other.rewards);
        self.next_states.extend(other.next_states.iter().cloned());
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// All columns have the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.rewards.len();
        self.states.len() == n && self.actions.len() == n && self.next_states.len() == n
    }
}

/// One actor's experience for a round, keyed by the agent it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub per_agent: BTreeMap<AgentId, TransitionBatch>,
}

impl Experience {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for a single agent's transitions.
    pub fn with_agent(mut self, agent_id: impl Into<AgentId>, batch: TransitionBatch) -> Self {
        self.per_agent.insert(agent_id.into(), batch);
        self
    }

    /// Total transitions across agents.
    pub fn transitions(&self) -> usize {
        self.per_agent.values().map(TransitionBatch::len).sum()
    }
}

/// Performance an actor observed while producing its experience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Total reward accumulated over the rollout.
    pub total_reward: f32,
    /// Environment steps taken.
    pub steps: usize,
}

impl PerformanceReport {
    pub fn new(total_reward: f32, steps: usize) -> Self {
        Self { total_reward, steps }
    }
}

/// Tagged message content. The variant determines the [`MessageTag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Submission {
        experience: Experience,
        performance: PerformanceReport,
    },
    Query {
        agent_id: AgentId,
        state: Vec<f32>,
    },
    ActionReply {
        agent_id: AgentId,
        action: Vec<f32>,
    },
}

impl Payload {
    pub fn tag(&self) -> MessageTag {
        match self {
            Payload::Submission { .. } => MessageTag::SubmitExperience,
            Payload::Query { .. } => MessageTag::QueryAction,
            Payload::ActionReply { .. } => MessageTag::ActionReply,
        }
    }
}
