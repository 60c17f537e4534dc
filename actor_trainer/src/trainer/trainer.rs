//! The trainer: registry wiring, round progress and dispatcher threads.

use super::config::TrainerConfig;
use super::handlers::{QueryHandler, SubmissionHandler, TrainerShared};
use super::round_state::RoundState;
use super::TrainerError;
use crate::checkpoint::CheckpointError;
use crate::learning::{LearningStep, PerformanceSummary, RoundPerformance, TargetUpdateSchedule};
use crate::messages::{Message, MessageTag, Role};
use crate::metrics::{coordination_metrics, SharedCoordinationMetrics};
use crate::registry::{DispatchOutcome, MatchKey, PatternRegistry, RegistryError};
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Coordinates actor submissions and queries for one learning step.
///
/// The actor peer count is read from the transport once, in [`Trainer::new`];
/// every quorum requires a message from each of those actors.
pub struct Trainer<L, T>
where
    L: LearningStep + 'static,
    T: Transport + 'static,
{
    config: TrainerConfig,
    registry: PatternRegistry,
    shared: Arc<TrainerShared<L>>,
    transport: Arc<T>,
    submit_key: MatchKey,
    query_key: Option<MatchKey>,
}

impl<L, T> Trainer<L, T>
where
    L: LearningStep + 'static,
    T: Transport + 'static,
{
    /// Validate `config`, resolve the actor peers and register the handlers.
    pub fn new(config: TrainerConfig, learner: L, transport: T) -> Result<Self, TrainerError> {
        config.validate().map_err(TrainerError::Config)?;

        let actors = transport.peers(Role::Actor).len();
        if actors == 0 {
            return Err(TrainerError::NoPeers(Role::Actor));
        }

        let metrics = coordination_metrics();
        let registry = PatternRegistry::with_metrics(Arc::clone(&metrics));
        let schedule = TargetUpdateSchedule::new(config.target_update_frequency, config.tau);
        let shared = Arc::new(TrainerShared::new(learner, schedule, metrics));
        let transport = Arc::new(transport);

        let submit_key = MatchKey::new(Role::Actor, MessageTag::SubmitExperience, actors)?;
        registry.register(
            submit_key,
            Arc::new(SubmissionHandler {
                shared: Arc::clone(&shared),
            }),
        )?;

        let query_key = if config.serve_actions {
            let key = MatchKey::new(Role::Actor, MessageTag::QueryAction, actors)?;
            registry.register(
                key,
                Arc::new(QueryHandler {
                    shared: Arc::clone(&shared),
                    transport: Arc::clone(&transport),
                }),
            )?;
            Some(key)
        } else {
            None
        };

        log::info!(
            "Trainer {} ready: {} actors, target update every {} rounds (tau={}), serving actions: {}",
            transport.local_peer(),
            actors,
            config.target_update_frequency,
            config.tau,
            config.serve_actions
        );

        Ok(Self {
            config,
            registry,
            shared,
            transport,
            submit_key,
            query_key,
        })
    }

    /// Route one inbound message through the registry.
    pub fn dispatch(&self, message: Message) -> Result<DispatchOutcome, RegistryError> {
        self.registry.dispatch(message)
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of actors every quorum waits for.
    pub fn actor_peers(&self) -> usize {
        self.submit_key.quorum()
    }

    pub fn submit_key(&self) -> MatchKey {
        self.submit_key
    }

    /// The query key, when action serving is enabled.
    pub fn query_key(&self) -> Option<MatchKey> {
        self.query_key
    }

    /// Current phase and counters.
    pub fn round_state(&self) -> RoundState {
        self.shared.progress.lock().state
    }

    /// Performance of the most recent round.
    pub fn last_round(&self) -> Option<RoundPerformance> {
        self.shared.progress.lock().tracker.last_round()
    }

    /// Learning step summary of the most recent successful round.
    pub fn last_summary(&self) -> Option<PerformanceSummary> {
        self.shared.progress.lock().last_summary.clone()
    }

    /// Lifetime mean of finite actor rewards.
    pub fn mean_reward(&self) -> f32 {
        self.shared.progress.lock().tracker.mean_reward()
    }

    pub fn metrics(&self) -> &SharedCoordinationMetrics {
        &self.shared.metrics
    }

    /// Run `f` with exclusive access to the learning step.
    pub fn with_learner<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        let mut learner = self.shared.learner.lock();
        f(&mut *learner)
    }

    /// Persist the learning step's models under `dir`.
    pub fn dump_models(&self, dir: &Path) -> Result<(), CheckpointError> {
        self.shared.learner.lock().dump_models(dir)
    }

    /// Start `n_dispatchers` threads that feed `mailbox` into [`dispatch`](Self::dispatch).
    ///
    /// Threads exit when the handle is stopped or the mailbox disconnects.
    pub fn spawn(
        self,
        mailbox: Receiver<Message>,
        n_dispatchers: usize,
    ) -> Result<TrainerHandle<L, T>, TrainerError> {
        if n_dispatchers == 0 {
            return Err(TrainerError::Config("n_dispatchers must be > 0"));
        }

        let trainer = Arc::new(self);
        let shutdown = Arc::new(AtomicBool::new(false));
        let poll = trainer.config.dispatch_poll_interval();

        let mut threads = Vec::with_capacity(n_dispatchers);
        for i in 0..n_dispatchers {
            let trainer = Arc::clone(&trainer);
            let mailbox = mailbox.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let spawned = std::thread::Builder::new()
                .name(format!("Trainer-Dispatch-{}", i))
                .spawn(move || loop {
                    if shutdown_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    match mailbox.recv_timeout(poll) {
                        // Per-message errors are logged by the registry.
                        Ok(message) => {
                            let _ = trainer.dispatch(message);
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            log::debug!("Dispatcher {}: mailbox disconnected", i);
                            break;
                        }
                    }
                });
            match spawned {
                Ok(thread) => threads.push(thread),
                Err(e) => {
                    shutdown.store(true, Ordering::Relaxed);
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(TrainerError::Spawn(e));
                }
            }
        }

        Ok(TrainerHandle {
            trainer,
            threads,
            shutdown,
        })
    }
}

/// Handle for a trainer running on dispatcher threads.
pub struct TrainerHandle<L, T>
where
    L: LearningStep + 'static,
    T: Transport + 'static,
{
    trainer: Arc<Trainer<L, T>>,
    threads: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl<L, T> TrainerHandle<L, T>
where
    L: LearningStep + 'static,
    T: Transport + 'static,
{
    /// The running trainer, for inspection.
    pub fn trainer(&self) -> &Arc<Trainer<L, T>> {
        &self.trainer
    }

    /// Ask every dispatcher to exit within one poll interval. Non-blocking.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Whether any dispatcher thread is still running.
    pub fn is_running(&self) -> bool {
        self.threads.iter().any(|t| !t.is_finished())
    }

    /// Wait for every dispatcher to exit. Returns the first panic, if any.
    pub fn join(self) -> std::thread::Result<()> {
        let mut result = Ok(());
        for thread in self.threads {
            if let Err(e) = thread.join() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Stop and wait for the dispatchers to finish.
    pub fn stop_and_wait(self) -> std::thread::Result<()> {
        self.stop();
        self.join()
    }
}
