//! Message types exchanged between the trainer and its actors.
//!
//! # Architecture
//!
//! ```text
//!    +----------+   SubmitExperience    +-------------+
//!    | Actor 0  | --------------------> |             |
//!    +----------+   QueryAction         |   Trainer   |
//!    | Actor 1  | --------------------> |   mailbox   |
//!    +----------+                       |             |
//!    | Actor N  | <-------------------- |             |
//!    +----------+   ActionReply         +-------------+
//!                   (in_reply_to = query correlation)
//! ```

mod message;
mod payload;

#[cfg(test)]
mod tests;

pub use message::{CorrelationId, Message, MessageTag, PeerId, Role};
pub use payload::{AgentId, Experience, Payload, PerformanceReport, TransitionBatch};
