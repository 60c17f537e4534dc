//! Explicit round state machine of the trainer.
//!
//! ```text
//!   Idle ──first submission buffered──► CollectingSubmissions
//!    ▲                                        │ quorum complete
//!    └──────── handler returns ◄──── Training ◄┘
//! ```
//!
//! Transitions are driven only from the submission handler's callbacks.

use std::fmt;

/// Phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrainerPhase {
    /// No submission buffered for the open round.
    #[default]
    Idle,
    /// At least one submission buffered, quorum not yet reached.
    CollectingSubmissions,
    /// The submission handler is training on a complete round.
    Training,
}

impl fmt::Display for TrainerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainerPhase::Idle => "idle",
            TrainerPhase::CollectingSubmissions => "collecting_submissions",
            TrainerPhase::Training => "training",
        };
        f.write_str(name)
    }
}

/// A transition the state machine does not allow. The state is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TrainerPhase,
    pub to: TrainerPhase,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid trainer transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Phase plus round and target-update counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundState {
    phase: TrainerPhase,
    rounds: u64,
    target_updates: u64,
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    /// Rounds trained successfully.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Target soft updates performed.
    pub fn target_updates(&self) -> u64 {
        self.target_updates
    }

    fn transition(&mut self, from: TrainerPhase, to: TrainerPhase) -> Result<(), InvalidTransition> {
        if self.phase != from {
            return Err(InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// `Idle -> CollectingSubmissions`.
    pub fn begin_collecting(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TrainerPhase::Idle, TrainerPhase::CollectingSubmissions)
    }

    /// `CollectingSubmissions -> Training`.
    pub fn begin_training(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TrainerPhase::CollectingSubmissions, TrainerPhase::Training)
    }

    /// `Training -> Idle` after a successful round.
    pub fn finish_round(&mut self, target_updated: bool) -> Result<(), InvalidTransition> {
        self.transition(TrainerPhase::Training, TrainerPhase::Idle)?;
        self.rounds += 1;
        if target_updated {
            self.target_updates += 1;
        }
        Ok(())
    }

    /// `Training -> Idle` after a failed round. Counters are unchanged.
    pub fn abort_round(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TrainerPhase::Training, TrainerPhase::Idle)
    }
}
