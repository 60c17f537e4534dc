//! Channel-backed transport for peers living in one process.

use super::{Transport, TransportError};
use crate::messages::{CorrelationId, Message, Payload, PeerId, Role};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Hub {
    mailboxes: BTreeMap<PeerId, Sender<Message>>,
    next_correlation: AtomicU64,
}

impl Hub {
    fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next_correlation.fetch_add(1, Ordering::Relaxed))
    }

    fn deliver(&self, to: PeerId, message: Message) -> Result<(), TransportError> {
        let tx = self
            .mailboxes
            .get(&to)
            .ok_or(TransportError::UnknownPeer(to))?;
        tx.send(message).map_err(|_| TransportError::Disconnected(to))
    }
}

/// A fixed set of peers connected by unbounded crossbeam channels.
///
/// Correlation ids are unique across the whole network.
pub struct InProcessNetwork {
    hub: Arc<Hub>,
    inboxes: Mutex<HashMap<PeerId, Receiver<Message>>>,
}

impl InProcessNetwork {
    /// One trainer plus `n_actors` actors.
    pub fn new(n_actors: usize) -> Self {
        let peers = std::iter::once(PeerId::trainer()).chain((0..n_actors).map(PeerId::actor));
        Self::with_peers(peers)
    }

    /// Arbitrary peer set.
    pub fn with_peers(peers: impl IntoIterator<Item = PeerId>) -> Self {
        let mut mailboxes = BTreeMap::new();
        let mut inboxes = HashMap::new();
        for peer in peers {
            let (tx, rx) = crossbeam_channel::unbounded();
            mailboxes.insert(peer, tx);
            inboxes.insert(peer, rx);
        }
        Self {
            hub: Arc::new(Hub {
                mailboxes,
                next_correlation: AtomicU64::new(1),
            }),
            inboxes: Mutex::new(inboxes),
        }
    }

    /// Take the endpoint for `peer`. Each endpoint can be taken once.
    pub fn endpoint(&self, peer: PeerId) -> Result<Endpoint, TransportError> {
        if !self.hub.mailboxes.contains_key(&peer) {
            return Err(TransportError::UnknownPeer(peer));
        }
        let inbox = self
            .inboxes
            .lock()
            .remove(&peer)
            .ok_or(TransportError::EndpointTaken(peer))?;
        Ok(Endpoint {
            local: peer,
            hub: Arc::clone(&self.hub),
            inbox,
        })
    }
}

/// One peer's view of an [`InProcessNetwork`].
#[derive(Clone)]
pub struct Endpoint {
    local: PeerId,
    hub: Arc<Hub>,
    inbox: Receiver<Message>,
}

impl Endpoint {
    /// Messages addressed to this peer.
    pub fn inbox(&self) -> &Receiver<Message> {
        &self.inbox
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("local", &self.local)
            .field("peers", &self.hub.mailboxes.len())
            .field("pending", &self.inbox.len())
            .finish()
    }
}

impl Transport for Endpoint {
    fn local_peer(&self) -> PeerId {
        self.local
    }

    fn peers(&self, role: Role) -> Vec<PeerId> {
        self.hub
            .mailboxes
            .keys()
            .filter(|p| p.role == role)
            .copied()
            .collect()
    }

    fn send(&self, to: PeerId, payload: Payload) -> Result<CorrelationId, TransportError> {
        let id = self.hub.next_id();
        self.hub.deliver(to, Message::new(self.local, id, payload))?;
        Ok(id)
    }

    fn reply(&self, request: &Message, payload: Payload) -> Result<CorrelationId, TransportError> {
        let id = self.hub.next_id();
        let message = Message::reply_to(request, self.local, id, payload);
        self.hub.deliver(request.source, message)?;
        Ok(id)
    }
}
