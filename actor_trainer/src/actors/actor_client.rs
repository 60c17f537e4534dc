//! Blocking client used by actor processes.
//!
//! Replies are matched to queries by correlation id, not by arrival order.
//! Messages that arrive while waiting for a different reply are held and
//! handed to whichever later call asks for them.

use crate::messages::{
    AgentId, CorrelationId, Experience, Message, Payload, PeerId, PerformanceReport,
};
use crate::transport::{Endpoint, Transport, TransportError};
use crossbeam_channel::RecvTimeoutError;
use std::time::{Duration, Instant};

/// Error type for actor client operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Sending failed.
    Transport(TransportError),
    /// No reply to this query within the timeout.
    Timeout(CorrelationId),
    /// The inbox disconnected while waiting.
    Disconnected,
    /// The reply to this query did not carry an action.
    UnexpectedReply(CorrelationId),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "Transport error: {}", e),
            ClientError::Timeout(id) => write!(f, "Timed out waiting for reply to {}", id),
            ClientError::Disconnected => write!(f, "Inbox disconnected"),
            ClientError::UnexpectedReply(id) => write!(f, "Reply to {} carried no action", id),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Transport(e)
    }
}

/// One actor's connection to the trainer.
pub struct ActorClient {
    endpoint: Endpoint,
    trainer: PeerId,
    held: Vec<Message>,
}

impl ActorClient {
    /// Client for `endpoint`, talking to the default trainer peer.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_trainer(endpoint, PeerId::trainer())
    }

    pub fn with_trainer(endpoint: Endpoint, trainer: PeerId) -> Self {
        Self {
            endpoint,
            trainer,
            held: Vec::new(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.endpoint.local_peer()
    }

    /// Messages received but not yet claimed by a caller.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Send this actor's experience and performance for the current round.
    pub fn submit(
        &self,
        experience: Experience,
        performance: PerformanceReport,
    ) -> Result<CorrelationId, ClientError> {
        let id = self.endpoint.send(
            self.trainer,
            Payload::Submission {
                experience,
                performance,
            },
        )?;
        Ok(id)
    }

    /// Send an action query without waiting for the answer.
    pub fn send_query(
        &self,
        agent_id: impl Into<AgentId>,
        state: Vec<f32>,
    ) -> Result<CorrelationId, ClientError> {
        let id = self.endpoint.send(
            self.trainer,
            Payload::Query {
                agent_id: agent_id.into(),
                state,
            },
        )?;
        Ok(id)
    }

    /// Block until the message answering `request` arrives.
    ///
    /// `None` waits forever. Unrelated messages received meanwhile are held.
    pub fn wait_reply(
        &mut self,
        request: CorrelationId,
        timeout: Option<Duration>,
    ) -> Result<Message, ClientError> {
        if let Some(pos) = self.held.iter().position(|m| m.answers(request)) {
            return Ok(self.held.remove(pos));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.endpoint.inbox().recv_timeout(remaining) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => return Err(ClientError::Timeout(request)),
                        Err(RecvTimeoutError::Disconnected) => return Err(ClientError::Disconnected),
                    }
                }
                None => self
                    .endpoint
                    .inbox()
                    .recv()
                    .map_err(|_| ClientError::Disconnected)?,
            };

            if received.answers(request) {
                return Ok(received);
            }
            log::trace!(
                "{}: holding {} while waiting for reply to {}",
                self.peer(),
                received.correlation,
                request
            );
            self.held.push(received);
        }
    }

    /// Query an action and block until the trainer answers.
    pub fn query_action(
        &mut self,
        agent_id: impl Into<AgentId>,
        state: Vec<f32>,
        timeout: Option<Duration>,
    ) -> Result<Vec<f32>, ClientError> {
        let request = self.send_query(agent_id, state)?;
        let reply = self.wait_reply(request, timeout)?;
        match reply.payload {
            Payload::ActionReply { action, .. } => Ok(action),
            _ => Err(ClientError::UnexpectedReply(request)),
        }
    }
}

impl std::fmt::Debug for ActorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorClient")
            .field("peer", &self.peer())
            .field("trainer", &self.trainer)
            .field("held", &self.held.len())
            .finish()
    }
}
