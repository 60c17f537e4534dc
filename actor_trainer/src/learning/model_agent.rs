//! A trainable burn module paired with its target copy.
//!
//! The numeric learning rule stays with the caller: [`ModelAgent`] owns the
//! models and bookkeeping, and delegates the optimizer step and the forward
//! pass to closures. A typical DDPG-style `train_fn` computes its bootstrap
//! targets with the target model and returns
//! `optimizer.step(lr, online, grads)` together with the loss.

use super::explorer::NoiseExplorer;
use super::target_network::soft_update;
use super::LearningError;
use crate::checkpoint::{CheckpointError, ModelKind, ModelStore};
use crate::messages::TransitionBatch;
use burn::module::Module;
use burn::tensor::backend::Backend;
use std::marker::PhantomData;

/// One optimization step: `(online, target, batch) -> (updated online, loss)`.
pub type TrainFn<M> =
    Box<dyn FnMut(M, &M, &TransitionBatch) -> Result<(M, f32), LearningError> + Send>;

/// Action selection: one action row per state row.
pub type PolicyFn<M> =
    Box<dyn FnMut(&M, &[Vec<f32>]) -> Result<Vec<Vec<f32>>, LearningError> + Send>;

/// A learning agent managed by [`AgentManager`](super::AgentManager).
///
/// Training is two-phase so that a multi-agent round can be applied all at
/// once: [`stage_train`](Agent::stage_train) computes the step and holds the
/// result, [`commit_train`](Agent::commit_train) applies it. Staging again
/// replaces any step still pending.
pub trait Agent: Send {
    /// Compute one optimization step without applying it. Returns the loss.
    fn stage_train(&mut self, batch: &TransitionBatch) -> Result<f32, LearningError>;

    /// Apply the pending step, if any.
    fn commit_train(&mut self);

    /// Drop the pending step, if any.
    fn discard_train(&mut self);

    /// Stage and commit in one call.
    fn train(&mut self, batch: &TransitionBatch) -> Result<f32, LearningError> {
        let loss = self.stage_train(batch)?;
        self.commit_train();
        Ok(loss)
    }

    /// One action per state, in order, exploration applied.
    fn choose_actions(&mut self, states: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, LearningError>;

    /// `target = tau * online + (1 - tau) * target`.
    fn soft_update_target(&mut self, tau: f32);

    /// Persist online and target models under `name`.
    fn save(&self, store: &ModelStore, name: &str) -> Result<(), CheckpointError>;

    /// Replace online and target models with the ones stored under `name`.
    fn load(&mut self, store: &ModelStore, name: &str) -> Result<(), CheckpointError>;
}

/// [`Agent`] backed by a burn [`Module`].
pub struct ModelAgent<B: Backend, M: Module<B>> {
    online: M,
    target: M,
    staged: Option<M>,
    device: B::Device,
    train_fn: TrainFn<M>,
    policy_fn: PolicyFn<M>,
    explorer: Option<Box<dyn NoiseExplorer>>,
    train_count: u64,
    _backend: PhantomData<B>,
}

impl<B: Backend, M: Module<B>> ModelAgent<B, M> {
    /// Wrap `model`. The target starts as a copy of it.
    pub fn new(model: M, device: B::Device, train_fn: TrainFn<M>, policy_fn: PolicyFn<M>) -> Self {
        let target = model.clone();
        Self {
            online: model,
            target,
            staged: None,
            device,
            train_fn,
            policy_fn,
            explorer: None,
            train_count: 0,
            _backend: PhantomData,
        }
    }

    /// Perturb selected actions with `explorer`.
    pub fn with_explorer(mut self, explorer: impl NoiseExplorer + 'static) -> Self {
        self.explorer = Some(Box::new(explorer));
        self
    }

    pub fn online(&self) -> &M {
        &self.online
    }

    pub fn target(&self) -> &M {
        &self.target
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Committed optimization steps.
    pub fn train_count(&self) -> u64 {
        self.train_count
    }

    /// A staged step is waiting for commit or discard.
    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }
}

impl<B: Backend, M: Module<B>> Agent for ModelAgent<B, M> {
    fn stage_train(&mut self, batch: &TransitionBatch) -> Result<f32, LearningError> {
        self.staged = None;
        let (online, loss) = (self.train_fn)(self.online.clone(), &self.target, batch)?;
        self.staged = Some(online);
        Ok(loss)
    }

    fn commit_train(&mut self) {
        if let Some(online) = self.staged.take() {
            self.online = online;
            self.train_count += 1;
        }
    }

    fn discard_train(&mut self) {
        self.staged = None;
    }

    fn choose_actions(&mut self, states: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, LearningError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let mut actions = (self.policy_fn)(&self.online, states)?;
        if actions.len() != states.len() {
            return Err(LearningError::RowMismatch {
                expected: states.len(),
                actual: actions.len(),
            });
        }
        if let Some(explorer) = self.explorer.as_mut() {
            explorer.perturb(&mut actions);
        }
        Ok(actions)
    }

    fn soft_update_target(&mut self, tau: f32) {
        let target = self.target.clone();
        self.target = soft_update::<B, M>(&self.online, target, tau);
    }

    fn save(&self, store: &ModelStore, name: &str) -> Result<(), CheckpointError> {
        store.save::<B, M>(&self.online, name, ModelKind::Online)?;
        store.save::<B, M>(&self.target, name, ModelKind::Target)?;
        Ok(())
    }

    fn load(&mut self, store: &ModelStore, name: &str) -> Result<(), CheckpointError> {
        let online = store.load::<B, M>(self.online.clone(), name, ModelKind::Online, &self.device)?;
        let target = store.load::<B, M>(self.target.clone(), name, ModelKind::Target, &self.device)?;
        self.online = online;
        self.target = target;
        self.staged = None;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::learning::explorer::{UniformNoiseConfig, UniformNoiseExplorer};
    use tempfile::tempdir;

    fn one_transition() -> TransitionBatch {
        let mut batch = TransitionBatch::new();
        batch.push(vec![1.0, 1.0], vec![0.0], 1.0, vec![1.0, 1.0]);
        batch
    }

    #[test]
    fn test_target_starts_as_copy() {
        let agent = agent(1.0, 3.0);
        assert_eq!(flat_weights(agent.online()), flat_weights(agent.target()));
    }

    #[test]
    fn test_train_replaces_online_only() {
        let mut agent = agent(1.0, 3.0);

        let loss = agent.train(&one_transition()).unwrap();

        assert_eq!(loss, 1.0);
        assert_eq!(agent.train_count(), 1);
        assert!(flat_weights(agent.online()).iter().all(|w| (w - 3.0).abs() < 1e-6));
        assert!(flat_weights(agent.target()).iter().all(|w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_staged_step_applies_only_on_commit() {
        let mut agent = agent(1.0, 3.0);

        assert_eq!(agent.stage_train(&one_transition()).unwrap(), 1.0);
        assert!(agent.has_staged());
        assert_eq!(agent.train_count(), 0);
        assert!(flat_weights(agent.online()).iter().all(|w| (w - 1.0).abs() < 1e-6));

        agent.commit_train();
        assert!(!agent.has_staged());
        assert_eq!(agent.train_count(), 1);
        assert!(flat_weights(agent.online()).iter().all(|w| (w - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_discarded_step_leaves_model() {
        let mut agent = agent(1.0, 3.0);

        agent.stage_train(&one_transition()).unwrap();
        agent.discard_train();
        agent.commit_train();

        assert_eq!(agent.train_count(), 0);
        assert!(flat_weights(agent.online()).iter().all(|w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_soft_update_blends_by_tau() {
        let mut agent = agent(1.0, 3.0);
        agent.train(&one_transition()).unwrap();

        agent.soft_update_target(0.5);
        assert!(flat_weights(agent.target()).iter().all(|w| (w - 2.0).abs() < 1e-5));

        agent.soft_update_target(1.0);
        assert!(flat_weights(agent.target()).iter().all(|w| (w - 3.0).abs() < 1e-5));
    }

    #[test]
    fn test_failed_train_keeps_model() {
        let mut agent: TestAgent = ModelAgent::new(
            constant_linear(2, 1, 1.0),
            Default::default(),
            Box::new(|_, _, _| Err(LearningError::Model("diverged".into()))),
            linear_policy(),
        );

        assert!(agent.train(&one_transition()).is_err());
        assert!(!agent.has_staged());
        assert_eq!(agent.train_count(), 0);
        assert!(flat_weights(agent.online()).iter().all(|w| (w - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_choose_actions_preserves_row_order() {
        // Constant 1.0 weights and bias: action = x0 + x1 + 1
        let mut agent = agent(1.0, 1.0);
        let actions = agent
            .choose_actions(&[vec![0.0, 0.0], vec![1.0, 2.0], vec![5.0, 5.0]])
            .unwrap();
        assert_eq!(actions, vec![vec![1.0], vec![4.0], vec![11.0]]);
    }

    #[test]
    fn test_choose_actions_empty() {
        let mut agent = agent(1.0, 1.0);
        assert!(agent.choose_actions(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_choose_actions_row_mismatch() {
        let mut agent: TestAgent = ModelAgent::new(
            constant_linear(2, 1, 1.0),
            Default::default(),
            replace_with(1.0),
            Box::new(|_, _| Ok(vec![vec![0.0]])),
        );
        let result = agent.choose_actions(&[vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(
            result,
            Err(LearningError::RowMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_explorer_applied_after_selection() {
        let explorer = UniformNoiseExplorer::new(
            UniformNoiseConfig::new(5.0, 6.0).with_seed(1),
        )
        .unwrap();
        let mut agent = agent(1.0, 1.0).with_explorer(explorer);

        let actions = agent.choose_actions(&[vec![0.0, 0.0]]).unwrap();
        assert!(actions[0][0] >= 6.0 && actions[0][0] <= 7.0);
    }

    #[test]
    fn test_save_and_load_both_models() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();

        let mut trained = agent(1.0, 3.0);
        trained.train(&one_transition()).unwrap();
        trained.save(&store, "policy").unwrap();
        assert!(store.contains("policy", ModelKind::Online));
        assert!(store.contains("policy", ModelKind::Target));

        let mut restored = agent(0.0, 0.0);
        restored.load(&store, "policy").unwrap();
        assert!(flat_weights(restored.online()).iter().all(|w| (w - 3.0).abs() < 1e-6));
        assert!(flat_weights(restored.target()).iter().all(|w| (w - 1.0).abs() < 1e-6));
    }
}
