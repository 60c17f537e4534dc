//! Structured identity of an aggregation pattern.

use super::error::RegistryError;
use crate::messages::{MessageTag, Role};
use std::fmt;
use std::num::NonZeroUsize;

/// Lookup identity of a pattern: which role sends which tag.
///
/// Two registrations collide when their patterns are equal, whatever their
/// required counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pattern {
    pub role: Role,
    pub tag: MessageTag,
}

impl Pattern {
    pub fn new(role: Role, tag: MessageTag) -> Self {
        Self { role, tag }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.tag)
    }
}

/// (source role, tag, required count) triple identifying one aggregation.
///
/// The required count is fixed when the key is built and never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub role: Role,
    pub tag: MessageTag,
    pub required: NonZeroUsize,
}

impl MatchKey {
    /// Build a key. Fails with [`RegistryError::InvalidQuorum`] when `required` is zero.
    pub fn new(role: Role, tag: MessageTag, required: usize) -> Result<Self, RegistryError> {
        let required =
            NonZeroUsize::new(required).ok_or(RegistryError::InvalidQuorum { role, tag })?;
        Ok(Self { role, tag, required })
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::new(self.role, self.tag)
    }

    /// Required count as a plain integer.
    pub fn quorum(&self) -> usize {
        self.required.get()
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.role, self.tag, self.required)
    }
}
