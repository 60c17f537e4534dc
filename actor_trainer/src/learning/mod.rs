//! Learning-step collaborators invoked by the trainer protocol.
//!
//! The trainer never touches model weights. It hands a fully assembled
//! [`ExperienceBatch`] to a [`LearningStep`], triggers target soft updates on
//! cadence, and forwards batched action queries.
//!
//! - [`AgentManager`]: `LearningStep` over a set of named agents
//! - [`ModelAgent`]: one burn module plus its target copy
//! - [`soft_update`]: Polyak averaging over module parameters
//! - [`GaussianNoiseExplorer`], [`UniformNoiseExplorer`]: action perturbation

pub mod agent_manager;
pub mod experience_batch;
pub mod explorer;
pub mod model_agent;
pub mod performance;
pub mod target_network;

pub use agent_manager::AgentManager;
pub use experience_batch::{ActorReport, ExperienceBatch};
pub use explorer::{
    GaussianNoiseConfig, GaussianNoiseExplorer, NoiseExplorer, UniformNoiseConfig,
    UniformNoiseExplorer,
};
pub use model_agent::{Agent, ModelAgent, PolicyFn, TrainFn};
pub use performance::{PerformanceTracker, RoundPerformance};
pub use target_network::{soft_update, TargetUpdateSchedule};

use crate::checkpoint::CheckpointError;
use crate::messages::AgentId;
use std::collections::BTreeMap;
use std::path::Path;

/// Error type for learning-step operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LearningError {
    /// No agent registered under this id.
    UnknownAgent(AgentId),
    /// An agent's merged transition columns have different lengths.
    InconsistentBatch(AgentId),
    /// Action selection returned the wrong number of rows.
    RowMismatch { expected: usize, actual: usize },
    /// Invalid explorer or agent configuration.
    InvalidConfig(String),
    /// Failure inside a caller-supplied training or policy function.
    Model(String),
}

impl std::fmt::Display for LearningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LearningError::UnknownAgent(id) => write!(f, "Unknown agent: {}", id),
            LearningError::InconsistentBatch(id) => {
                write!(f, "Inconsistent transition batch for agent {}", id)
            }
            LearningError::RowMismatch { expected, actual } => write!(
                f,
                "Action batch has {} rows, expected {}",
                actual, expected
            ),
            LearningError::InvalidConfig(e) => write!(f, "Invalid config: {}", e),
            LearningError::Model(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for LearningError {}

/// Result of one optimization update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    /// Transitions consumed across all agents.
    pub transitions: usize,
    /// Loss reported by each trained agent.
    pub losses: BTreeMap<AgentId, f32>,
}

impl PerformanceSummary {
    /// Number of agents that trained this round.
    pub fn agents_trained(&self) -> usize {
        self.losses.len()
    }

    /// Mean of the finite per-agent losses, if any.
    pub fn mean_loss(&self) -> Option<f32> {
        let finite: Vec<f32> = self.losses.values().copied().filter(|l| l.is_finite()).collect();
        if finite.is_empty() {
            None
        } else {
            Some(finite.iter().sum::<f32>() / finite.len() as f32)
        }
    }
}

/// Learning collaborator driven by the trainer protocol.
///
/// Every method is called with the trainer's learner lock held, so
/// implementations never see concurrent calls.
pub trait LearningStep: Send {
    /// Perform one optimization update on a complete round of experience.
    fn train_on_batch(&mut self, batch: &ExperienceBatch) -> Result<PerformanceSummary, LearningError>;

    /// Blend target models toward online models: `target = tau*online + (1-tau)*target`.
    fn soft_update_target(&mut self, tau: f32);

    /// Compute one action row per state row, in order.
    fn select_actions(
        &mut self,
        agent_id: &AgentId,
        states: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>, LearningError>;

    /// Persist all models under `dir`.
    fn dump_models(&self, dir: &Path) -> Result<(), CheckpointError>;
}
