//! Quorum handlers bound by the trainer.
//!
//! Both handlers share one [`TrainerShared`]: the learning step sits behind a
//! single mutex so training and action selection never touch the models at
//! the same time. Lock order is `progress` before `learner`.

use super::round_state::RoundState;
use crate::learning::{
    ActorReport, ExperienceBatch, LearningStep, PerformanceSummary, PerformanceTracker,
    TargetUpdateSchedule,
};
use crate::messages::{AgentId, Message, Payload};
use crate::metrics::SharedCoordinationMetrics;
use crate::registry::{HandlerError, MatchKey, QuorumHandler};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Round bookkeeping written only by the submission handler.
///
/// `state` holds the only completed-round counter; `schedule` is consulted
/// with the number of the round being finished.
#[derive(Debug)]
pub(crate) struct RoundProgress {
    pub state: RoundState,
    pub schedule: TargetUpdateSchedule,
    pub tracker: PerformanceTracker,
    pub last_summary: Option<PerformanceSummary>,
}

pub(crate) struct TrainerShared<L> {
    pub learner: Mutex<L>,
    pub progress: Mutex<RoundProgress>,
    pub metrics: SharedCoordinationMetrics,
}

impl<L: LearningStep> TrainerShared<L> {
    pub fn new(learner: L, schedule: TargetUpdateSchedule, metrics: SharedCoordinationMetrics) -> Self {
        Self {
            learner: Mutex::new(learner),
            progress: Mutex::new(RoundProgress {
                state: RoundState::new(),
                schedule,
                tracker: PerformanceTracker::new(),
                last_summary: None,
            }),
            metrics,
        }
    }
}

/// Turns a complete submission quorum into one training round.
pub(crate) struct SubmissionHandler<L> {
    pub shared: Arc<TrainerShared<L>>,
}

fn collect_batch(round: u64, messages: Vec<Message>) -> Result<ExperienceBatch, HandlerError> {
    let mut batch = ExperienceBatch::new(round);
    for message in messages {
        let source = message.source;
        match message.payload {
            Payload::Submission {
                experience,
                performance,
            } => {
                batch.insert(
                    source,
                    ActorReport {
                        experience,
                        performance,
                    },
                );
            }
            other => {
                return Err(HandlerError::new(format!(
                    "Expected submission from {}, got {}",
                    source,
                    other.tag()
                )))
            }
        }
    }
    Ok(batch)
}

impl<L: LearningStep> QuorumHandler for SubmissionHandler<L> {
    fn on_buffered(&self, key: &MatchKey, buffered: usize) {
        if buffered != 1 {
            return;
        }
        if let Err(e) = self.shared.progress.lock().state.begin_collecting() {
            log::warn!("{}: {}", key, e);
        }
    }

    fn on_quorum(&self, key: &MatchKey, messages: Vec<Message>) -> Result<(), HandlerError> {
        let mut progress = self.shared.progress.lock();
        progress
            .state
            .begin_training()
            .map_err(|e| HandlerError::new(e.to_string()))?;

        let round = progress.state.rounds() + 1;
        let batch = match collect_batch(round, messages) {
            Ok(batch) => batch,
            Err(e) => {
                let _ = progress.state.abort_round();
                return Err(e);
            }
        };
        let performance = progress.tracker.record_round(&batch);

        let mut learner = self.shared.learner.lock();
        let summary = match learner.train_on_batch(&batch) {
            Ok(summary) => summary,
            Err(e) => {
                let _ = progress.state.abort_round();
                return Err(HandlerError::new(format!("Round {} training failed: {}", round, e)));
            }
        };

        let due = progress.schedule.is_due(round);
        if due {
            let tau = progress.schedule.tau();
            learner.soft_update_target(tau);
            self.shared.metrics.record_target_update();
            log::debug!("Round {}: target soft update (tau={})", round, tau);
        }
        drop(learner);

        self.shared.metrics.record_round();
        progress
            .state
            .finish_round(due)
            .map_err(|e| HandlerError::new(e.to_string()))?;

        log::info!(
            "{} round {}: {} actors, {} transitions, mean reward {:.3}, loss {}",
            key,
            round,
            performance.actors,
            summary.transitions,
            performance.mean_reward,
            summary
                .mean_loss()
                .map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l))
        );
        progress.last_summary = Some(summary);
        Ok(())
    }
}

/// Answers a complete query quorum, one reply per query.
pub(crate) struct QueryHandler<L, T> {
    pub shared: Arc<TrainerShared<L>>,
    pub transport: Arc<T>,
}

impl<L: LearningStep, T: Transport> QueryHandler<L, T> {
    /// Actions for every query, position `i` answering message `i`.
    ///
    /// `select_actions` runs once per distinct agent id, over that agent's
    /// states in arrival order.
    fn select(&self, messages: &[Message]) -> Result<Vec<(AgentId, Vec<f32>)>, HandlerError> {
        let mut groups: BTreeMap<&AgentId, (Vec<usize>, Vec<Vec<f32>>)> = BTreeMap::new();
        for (i, message) in messages.iter().enumerate() {
            match &message.payload {
                Payload::Query { agent_id, state } => {
                    let group = groups.entry(agent_id).or_default();
                    group.0.push(i);
                    group.1.push(state.clone());
                }
                other => {
                    return Err(HandlerError::new(format!(
                        "Expected query from {}, got {}",
                        message.source,
                        other.tag()
                    )))
                }
            }
        }

        let mut actions: Vec<Option<(AgentId, Vec<f32>)>> = vec![None; messages.len()];
        let mut learner = self.shared.learner.lock();
        for (agent_id, (positions, states)) in groups {
            let selected = learner
                .select_actions(agent_id, &states)
                .map_err(|e| HandlerError::new(format!("select_actions for {}: {}", agent_id, e)))?;
            if selected.len() != positions.len() {
                return Err(HandlerError::new(format!(
                    "select_actions for {} returned {} rows for {} states",
                    agent_id,
                    selected.len(),
                    positions.len()
                )));
            }
            for (position, action) in positions.into_iter().zip(selected) {
                actions[position] = Some((agent_id.clone(), action));
            }
        }
        drop(learner);

        actions
            .into_iter()
            .map(|a| a.ok_or_else(|| HandlerError::new("query left unanswered")))
            .collect()
    }
}

impl<L: LearningStep, T: Transport> QuorumHandler for QueryHandler<L, T> {
    fn on_quorum(&self, key: &MatchKey, messages: Vec<Message>) -> Result<(), HandlerError> {
        let actions = self.select(&messages)?;

        let mut replied = 0;
        for (request, (agent_id, action)) in messages.iter().zip(actions) {
            match self
                .transport
                .reply(request, Payload::ActionReply { agent_id, action })
            {
                Ok(_) => replied += 1,
                Err(e) => {
                    self.shared.metrics.record_reply_failure();
                    log::warn!(
                        "{}: reply to {} ({}) failed: {}",
                        key,
                        request.source,
                        request.correlation,
                        e
                    );
                }
            }
        }
        self.shared.metrics.add_queries_served(replied);
        log::debug!("{}: answered {}/{} queries", key, replied, messages.len());
        Ok(())
    }
}
