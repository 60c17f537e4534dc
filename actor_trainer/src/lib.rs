//! # Actor Trainer: Quorum-Gated Actor/Trainer Coordination
//!
//! Coordination layer between a set of experience-collecting actors and one
//! trainer. Inbound messages are buffered per (role, tag) until every actor
//! has contributed, then handed to a handler exactly once.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Actor 0          Actor 1          Actor N                           │
//! │  ActorClient      ActorClient      ActorClient                       │
//! │      │                │                │                             │
//! │      └────────────────┼────────────────┘                             │
//! │                       ▼  Transport (InProcessNetwork)                │
//! │              ┌─────────────────┐                                     │
//! │              │ Trainer mailbox │──► dispatcher threads               │
//! │              └────────┬────────┘                                     │
//! │                       ▼                                              │
//! │              ┌─────────────────┐  quorum   ┌──────────────────────┐  │
//! │              │ PatternRegistry │──────────►│ Submission / Query   │  │
//! │              │ (per-key lock)  │           │ handlers             │  │
//! │              └─────────────────┘           └──────────┬───────────┘  │
//! │                                                       ▼              │
//! │                                            ┌──────────────────────┐  │
//! │                                            │ LearningStep         │  │
//! │                                            │ (AgentManager)       │  │
//! │                                            └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use actor_trainer::{AgentManager, InProcessNetwork, PeerId, Trainer, TrainerConfig};
//!
//! let net = InProcessNetwork::new(4);
//! let endpoint = net.endpoint(PeerId::trainer())?;
//! let mailbox = endpoint.inbox().clone();
//!
//! let config = TrainerConfig::new()
//!     .with_target_update_frequency(5)
//!     .with_tau(0.01)
//!     .with_serve_actions(true);
//!
//! let agents = AgentManager::new().with_agent("policy", model_agent);
//! let handle = Trainer::new(config, agents, endpoint)?.spawn(mailbox, 2)?;
//! ```

pub mod actors;
pub mod checkpoint;
pub mod learning;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod trainer;
pub mod transport;

pub use actors::{ActorClient, ClientError};
pub use checkpoint::{CheckpointError, ModelKind, ModelStore};
pub use learning::{
    soft_update, Agent, AgentManager, ExperienceBatch, GaussianNoiseConfig, GaussianNoiseExplorer,
    LearningError, LearningStep, ModelAgent, NoiseExplorer, PerformanceSummary,
    PerformanceTracker, TargetUpdateSchedule, UniformNoiseConfig, UniformNoiseExplorer,
};
pub use messages::{
    AgentId, CorrelationId, Experience, Message, MessageTag, Payload, PeerId, PerformanceReport,
    Role, TransitionBatch,
};
pub use metrics::{coordination_metrics, CoordinationMetrics, SharedCoordinationMetrics};
pub use registry::{
    DispatchOutcome, HandlerError, MatchKey, PatternRegistry, QuorumHandler, RegistryError,
    StalledQuorum,
};
pub use trainer::{
    RoundState, Trainer, TrainerConfig, TrainerError, TrainerHandle, TrainerPhase,
};
pub use transport::{Endpoint, InProcessNetwork, Transport, TransportError};
