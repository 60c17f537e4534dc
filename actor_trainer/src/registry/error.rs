//! Error taxonomy of the pattern registry.

use super::match_key::MatchKey;
use crate::messages::{CorrelationId, MessageTag, PeerId, Role};
use std::time::Duration;

/// A key whose open buffer has waited longer than a supervisor's window.
///
/// Produced only by [`PatternRegistry::stalled`](super::PatternRegistry::stalled);
/// the registry never acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledQuorum {
    pub key: MatchKey,
    /// Messages buffered so far.
    pub buffered: usize,
    /// Age of the oldest buffered message.
    pub waiting: Duration,
}

/// Error type for registration and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A match key was built with a zero required count.
    InvalidQuorum { role: Role, tag: MessageTag },
    /// A different handler (or required count) is already bound to this role and tag.
    DuplicateRegistration { existing: MatchKey, requested: MatchKey },
    /// The source already has a message in the open buffer for this key.
    UnexpectedDuplicateSource {
        key: MatchKey,
        source: PeerId,
        correlation: CorrelationId,
    },
    /// No registration matches the message's role and tag.
    UnroutableMessage { source: PeerId, tag: MessageTag },
    /// The handler reported a failure. The round's buffer was consumed.
    HandlerFailed { key: MatchKey, reason: String },
    /// Reported by supervisors, never by `dispatch`.
    StalledQuorum(StalledQuorum),
}

impl RegistryError {
    /// Registration-time errors abort initialization; the rest are per-message.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RegistryError::InvalidQuorum { .. } | RegistryError::DuplicateRegistration { .. }
        )
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidQuorum { role, tag } => {
                write!(f, "Required count for {}:{} must be positive", role, tag)
            }
            RegistryError::DuplicateRegistration { existing, requested } => write!(
                f,
                "Duplicate registration: {} conflicts with existing {}",
                requested, existing
            ),
            RegistryError::UnexpectedDuplicateSource {
                key,
                source,
                correlation,
            } => write!(
                f,
                "Unexpected duplicate source {} ({}) for open quorum {}",
                source, correlation, key
            ),
            RegistryError::UnroutableMessage { source, tag } => {
                write!(f, "Unroutable message {} from {}", tag, source)
            }
            RegistryError::HandlerFailed { key, reason } => {
                write!(f, "Handler for {} failed: {}", key, reason)
            }
            RegistryError::StalledQuorum(s) => write!(
                f,
                "Stalled quorum {}: {}/{} buffered for {:?}",
                s.key,
                s.buffered,
                s.key.required,
                s.waiting
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<StalledQuorum> for RegistryError {
    fn from(s: StalledQuorum) -> Self {
        RegistryError::StalledQuorum(s)
    }
}

/// Failure reported by a quorum handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    reason: String,
}

impl HandlerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for HandlerError {}
