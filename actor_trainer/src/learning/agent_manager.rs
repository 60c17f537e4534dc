//! [`LearningStep`] over a set of named agents.

use super::experience_batch::ExperienceBatch;
use super::model_agent::Agent;
use super::{LearningError, LearningStep, PerformanceSummary};
use crate::checkpoint::{CheckpointError, ModelStore};
use crate::messages::AgentId;
use std::collections::BTreeMap;
use std::path::Path;

/// Routes training, target updates and action queries to agents by id.
#[derive(Default)]
pub struct AgentManager {
    agents: BTreeMap<AgentId, Box<dyn Agent>>,
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AgentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_agent(mut self, id: impl Into<AgentId>, agent: impl Agent + 'static) -> Self {
        self.insert(id, agent);
        self
    }

    /// Add an agent, returning the one previously registered under `id`.
    pub fn insert(
        &mut self,
        id: impl Into<AgentId>,
        agent: impl Agent + 'static,
    ) -> Option<Box<dyn Agent>> {
        self.agents.insert(id.into(), Box::new(agent))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Registered ids, sorted.
    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.keys()
    }

    /// Restore every agent from `dir`, as written by [`LearningStep::dump_models`].
    pub fn load_models(&mut self, dir: &Path) -> Result<(), CheckpointError> {
        let store = ModelStore::new(dir)?;
        for (id, agent) in self.agents.iter_mut() {
            agent.load(&store, id.as_str())?;
        }
        log::info!("Loaded {} agents from {}", self.agents.len(), dir.display());
        Ok(())
    }
}

impl LearningStep for AgentManager {
    /// Every agent id in the batch must be known and have consistent columns;
    /// otherwise nothing trains. Agents with no transitions this round are skipped.
    ///
    /// The round is applied all-or-nothing: every agent stages its step first,
    /// and the steps are committed only once all of them succeeded.
    fn train_on_batch(&mut self, batch: &ExperienceBatch) -> Result<PerformanceSummary, LearningError> {
        let merged = batch.merged();
        for (id, transitions) in &merged {
            if !self.agents.contains_key(id) {
                return Err(LearningError::UnknownAgent(id.clone()));
            }
            if !transitions.is_consistent() {
                return Err(LearningError::InconsistentBatch(id.clone()));
            }
        }

        let mut summary = PerformanceSummary::default();
        let mut staged: Vec<&AgentId> = Vec::new();
        for (id, transitions) in merged.iter().filter(|(_, t)| !t.is_empty()) {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            match agent.stage_train(transitions) {
                Ok(loss) => {
                    log::debug!(
                        "Round {}: agent {} staged on {} transitions, loss {:.4}",
                        batch.round(),
                        id,
                        transitions.len(),
                        loss
                    );
                    staged.push(id);
                    summary.transitions += transitions.len();
                    summary.losses.insert(id.clone(), loss);
                }
                Err(e) => {
                    agent.discard_train();
                    for done in staged {
                        if let Some(agent) = self.agents.get_mut(done) {
                            agent.discard_train();
                        }
                    }
                    log::warn!(
                        "Round {}: agent {} failed to train, round discarded",
                        batch.round(),
                        id
                    );
                    return Err(e);
                }
            }
        }

        for id in staged {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.commit_train();
            }
        }
        Ok(summary)
    }

    fn soft_update_target(&mut self, tau: f32) {
        for agent in self.agents.values_mut() {
            agent.soft_update_target(tau);
        }
    }

    fn select_actions(
        &mut self,
        agent_id: &AgentId,
        states: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>, LearningError> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| LearningError::UnknownAgent(agent_id.clone()))?;
        agent.choose_actions(states)
    }

    fn dump_models(&self, dir: &Path) -> Result<(), CheckpointError> {
        let store = ModelStore::new(dir)?;
        for (id, agent) in &self.agents {
            agent.save(&store, id.as_str())?;
        }
        log::info!("Dumped {} agents to {}", self.agents.len(), dir.display());
        Ok(())
    }
}
