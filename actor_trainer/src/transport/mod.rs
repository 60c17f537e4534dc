//! Message transport consumed by the trainer protocol.
//!
//! The coordination layer only needs three things from the network:
//! peer enumeration, point-to-point send, and reply-to-sender. Those are
//! captured by [`Transport`]. [`InProcessNetwork`] wires peers together with
//! crossbeam channels for single-process deployments and tests.

mod in_process;

pub use in_process::{Endpoint, InProcessNetwork};

use crate::messages::{CorrelationId, Message, Payload, PeerId, Role};

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Destination peer is not part of the network.
    UnknownPeer(PeerId),
    /// Destination peer's mailbox has been dropped.
    Disconnected(PeerId),
    /// The endpoint for this peer was already handed out.
    EndpointTaken(PeerId),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::UnknownPeer(p) => write!(f, "Unknown peer: {}", p),
            TransportError::Disconnected(p) => write!(f, "Peer disconnected: {}", p),
            TransportError::EndpointTaken(p) => write!(f, "Endpoint already taken: {}", p),
        }
    }
}

impl std::error::Error for TransportError {}

/// Point-to-point, reply-capable delivery between named peers.
pub trait Transport: Send + Sync {
    /// Identity of the local peer.
    fn local_peer(&self) -> PeerId;

    /// All known peers of `role`, in index order.
    fn peers(&self, role: Role) -> Vec<PeerId>;

    /// Send `payload` to `to`. Returns the correlation id assigned to the message.
    fn send(&self, to: PeerId, payload: Payload) -> Result<CorrelationId, TransportError>;

    /// Reply to `request`'s sender, echoing its correlation id.
    fn reply(&self, request: &Message, payload: Payload) -> Result<CorrelationId, TransportError>;
}
