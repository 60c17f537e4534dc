//! Message envelope and peer identity.
//!
//! Every message carries a transport-assigned [`CorrelationId`]. Replies echo
//! the request's id in `in_reply_to`, so a reply can be routed and tested
//! without a live peer.

use super::payload::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a peer in the actor/trainer topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Experience generator and action requester.
    Actor,
    /// Single learner that aggregates actor traffic.
    Trainer,
}

impl Role {
    /// Lowercase role name used in peer names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Actor => "actor",
            Role::Trainer => "trainer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one peer: its role plus an index within that role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId {
    pub role: Role,
    pub index: usize,
}

impl PeerId {
    pub fn new(role: Role, index: usize) -> Self {
        Self { role, index }
    }

    /// Shorthand for `PeerId::new(Role::Actor, index)`.
    pub fn actor(index: usize) -> Self {
        Self::new(Role::Actor, index)
    }

    /// The single trainer peer.
    pub fn trainer() -> Self {
        Self::new(Role::Trainer, 0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.role, self.index)
    }
}

/// Semantic kind of a message.
///
/// Derived from the [`Payload`] variant, never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageTag {
    /// Actor reports a rollout's experience and performance.
    SubmitExperience,
    /// Actor asks the trainer for an action.
    QueryAction,
    /// Trainer answers a `QueryAction`.
    ActionReply,
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageTag::SubmitExperience => "submit_experience",
            MessageTag::QueryAction => "query_action",
            MessageTag::ActionReply => "action_reply",
        };
        f.write_str(name)
    }
}

/// Transport-assigned token identifying one sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable unit of communication between peers.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Sending peer.
    pub source: PeerId,
    /// Identity of this message, assigned at send time.
    pub correlation: CorrelationId,
    /// Correlation id of the request this message answers, if any.
    pub in_reply_to: Option<CorrelationId>,
    /// Tagged content.
    pub payload: Payload,
}

impl Message {
    /// Create a message that does not answer another message.
    pub fn new(source: PeerId, correlation: CorrelationId, payload: Payload) -> Self {
        Self {
            source,
            correlation,
            in_reply_to: None,
            payload,
        }
    }

    /// Create a reply to `request`.
    pub fn reply_to(
        request: &Message,
        source: PeerId,
        correlation: CorrelationId,
        payload: Payload,
    ) -> Self {
        Self {
            source,
            correlation,
            in_reply_to: Some(request.correlation),
            payload,
        }
    }

    /// Tag of the carried payload.
    pub fn tag(&self) -> MessageTag {
        self.payload.tag()
    }

    /// Role of the sending peer.
    pub fn source_role(&self) -> Role {
        self.source.role
    }

    /// Whether this message answers `request`.
    pub fn answers(&self, request: CorrelationId) -> bool {
        self.in_reply_to == Some(request)
    }
}
