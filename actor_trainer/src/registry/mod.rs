//! Pattern registry: quorum-gated aggregation of inbound messages.
//!
//! - [`MatchKey`]: (role, tag, required count) identity of one pattern
//! - [`PatternRegistry`]: buffers messages per key and fires the bound
//!   [`QuorumHandler`] exactly once per completed quorum
//! - [`RegistryError`]: registration-time (fatal) and per-message (non-fatal) errors

pub mod error;
pub mod match_key;
pub mod pattern_registry;

#[cfg(test)]
mod tests;

pub use error::{HandlerError, RegistryError, StalledQuorum};
pub use match_key::{MatchKey, Pattern};
pub use pattern_registry::{
    DispatchOutcome, PatternRegistry, PendingQuorum, QuorumHandler, SharedHandler,
};
