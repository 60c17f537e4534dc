//! Trainer protocol.
//!
//! # Architecture
//!
//! ```text
//!   actors ──SubmitExperience──► PatternRegistry ──quorum(N)──► SubmissionHandler
//!                                      │                           train_on_batch
//!                                      │                           every K rounds: soft_update_target
//!          ──QueryAction──────────────►┘ ──quorum(N)──► QueryHandler
//!                                                        select_actions, reply per query
//! ```
//!
//! N is the number of actor peers known to the transport when the trainer
//! is built. Submissions and queries use separate keys and never share a
//! buffer. A missing actor stalls its key; there is no timeout here, see
//! [`PatternRegistry::stalled`](crate::registry::PatternRegistry::stalled).

mod config;
mod handlers;
mod round_state;
#[allow(clippy::module_inception)]
mod trainer;


pub use config::TrainerConfig;
pub use round_state::{InvalidTransition, RoundState, TrainerPhase};
pub use trainer::{Trainer, TrainerHandle};

use crate::messages::Role;
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Error type for trainer construction and control.
#[derive(Debug)]
pub enum TrainerError {
    /// Invalid configuration.
    Config(&'static str),
    /// The transport knows no peers of this role.
    NoPeers(Role),
    /// Handler registration failed.
    Registry(RegistryError),
    /// Transport failure.
    Transport(TransportError),
    /// Round state machine rejected a transition.
    State(InvalidTransition),
    /// A dispatcher thread could not be spawned.
    Spawn(std::io::Error),
}

impl std::fmt::Display for TrainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainerError::Config(e) => write!(f, "Invalid trainer config: {}", e),
            TrainerError::NoPeers(role) => write!(f, "No {} peers available", role),
            TrainerError::Registry(e) => write!(f, "Registry error: {}", e),
            TrainerError::Transport(e) => write!(f, "Transport error: {}", e),
            TrainerError::State(e) => write!(f, "{}", e),
            TrainerError::Spawn(e) => write!(f, "Failed to spawn dispatcher: {}", e),
        }
    }
}

impl std::error::Error for TrainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainerError::Registry(e) => Some(e),
            TrainerError::Transport(e) => Some(e),
            TrainerError::State(e) => Some(e),
            TrainerError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for TrainerError {
    fn from(e: RegistryError) -> Self {
        TrainerError::Registry(e)
    }
}

impl From<TransportError> for TrainerError {
    fn from(e: TransportError) -> Self {
        TrainerError::Transport(e)
    }
}

impl From<InvalidTransition> for TrainerError {
    fn from(e: InvalidTransition) -> Self {
        TrainerError::State(e)
    }
}
