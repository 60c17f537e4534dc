//! Quorum-gated message aggregation.
//!
//! # Design
//!
//! ```text
//!   dispatch(msg) ──► DashMap<Pattern, Arc<PatternSlot>> ──► slot.buffer (Mutex)
//!                         (shard guard dropped here)            │
//!                                                               ▼
//!                                          len == required ? take buffer,
//!                                          run handler under the slot lock
//! ```
//!
//! The key map lock is never held while a handler runs. Each slot has its own
//! mutex, held for the whole handler call, so:
//! - no two fires for one key overlap, and the next message for that key
//!   waits until the handler returns (backpressure);
//! - dispatches for other keys proceed in parallel.
//!
//! A handler must not dispatch into its own key: the slot mutex is not
//! reentrant.

use super::error::{HandlerError, RegistryError, StalledQuorum};
use super::match_key::{MatchKey, Pattern};
use crate::messages::{Message, MessageTag, Role};
use crate::metrics::{coordination_metrics, SharedCoordinationMetrics};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback bound to one [`MatchKey`].
pub trait QuorumHandler: Send + Sync {
    /// Called once per completed quorum with the buffered messages in arrival order.
    fn on_quorum(&self, key: &MatchKey, messages: Vec<Message>) -> Result<(), HandlerError>;

    /// Called after each accepted message, including the one completing the quorum.
    fn on_buffered(&self, _key: &MatchKey, _buffered: usize) {}
}

impl<F> QuorumHandler for F
where
    F: Fn(&MatchKey, Vec<Message>) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_quorum(&self, key: &MatchKey, messages: Vec<Message>) -> Result<(), HandlerError> {
        self(key, messages)
    }
}

/// Shared handler reference. Identity (for idempotent re-registration) is the `Arc` pointer.
pub type SharedHandler = Arc<dyn QuorumHandler>;

/// Result of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Message buffered; quorum not yet reached.
    Buffered { buffered: usize, required: usize },
    /// Quorum reached; the handler ran on `delivered` messages and succeeded.
    Fired { delivered: usize },
}

/// Snapshot of one registration's open buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuorum {
    pub key: MatchKey,
    /// Messages in the open buffer. Zero when `in_flight`.
    pub buffered: usize,
    /// Age of the oldest buffered message.
    pub oldest: Option<Duration>,
    /// A handler is running for this key right now.
    pub in_flight: bool,
}

#[derive(Default)]
struct QuorumBuffer {
    messages: Vec<Message>,
    opened_at: Option<Instant>,
}

struct PatternSlot {
    key: MatchKey,
    handler: SharedHandler,
    buffer: Mutex<QuorumBuffer>,
}

fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl PatternSlot {
    fn new(key: MatchKey, handler: SharedHandler) -> Self {
        Self {
            key,
            handler,
            buffer: Mutex::new(QuorumBuffer::default()),
        }
    }

    fn accept(
        &self,
        message: Message,
        metrics: &SharedCoordinationMetrics,
    ) -> Result<DispatchOutcome, RegistryError> {
        let mut buffer = self.buffer.lock();

        if buffer.messages.iter().any(|m| m.source == message.source) {
            metrics.record_duplicate();
            log::warn!(
                "Rejecting duplicate {} from {} ({}) for open quorum {}",
                message.tag(),
                message.source,
                message.correlation,
                self.key
            );
            return Err(RegistryError::UnexpectedDuplicateSource {
                key: self.key,
                source: message.source,
                correlation: message.correlation,
            });
        }

        if buffer.messages.is_empty() {
            buffer.opened_at = Some(Instant::now());
        }
        buffer.messages.push(message);
        metrics.record_buffered();

        let buffered = buffer.messages.len();
        let required = self.key.quorum();
        self.handler.on_buffered(&self.key, buffered);

        if buffered < required {
            log::trace!("{}: {}/{} buffered", self.key, buffered, required);
            return Ok(DispatchOutcome::Buffered { buffered, required });
        }

        let batch = std::mem::take(&mut buffer.messages);
        buffer.opened_at = None;
        metrics.record_quorum();
        log::debug!("Quorum {} complete, firing handler", self.key);

        // The slot stays locked until the handler returns.
        let result = self.handler.on_quorum(&self.key, batch);
        drop(buffer);

        match result {
            Ok(()) => Ok(DispatchOutcome::Fired {
                delivered: required,
            }),
            Err(e) => {
                metrics.record_handler_failure();
                log::error!("Handler for {} failed: {}", self.key, e);
                Err(RegistryError::HandlerFailed {
                    key: self.key,
                    reason: e.reason().to_string(),
                })
            }
        }
    }

    fn pending(&self) -> PendingQuorum {
        match self.buffer.try_lock() {
            Some(buffer) => PendingQuorum {
                key: self.key,
                buffered: buffer.messages.len(),
                oldest: buffer.opened_at.map(|t| t.elapsed()),
                in_flight: false,
            },
            None => PendingQuorum {
                key: self.key,
                buffered: 0,
                oldest: None,
                in_flight: true,
            },
        }
    }
}

/// Maps match keys to handlers and buffers messages until each quorum completes.
pub struct PatternRegistry {
    slots: DashMap<Pattern, Arc<PatternSlot>>,
    metrics: SharedCoordinationMetrics,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRegistry")
            .field("registrations", &self.registrations())
            .finish()
    }
}

impl PatternRegistry {
    /// Create an empty registry with its own metrics.
    pub fn new() -> Self {
        Self::with_metrics(coordination_metrics())
    }

    /// Create an empty registry that reports into `metrics`.
    pub fn with_metrics(metrics: SharedCoordinationMetrics) -> Self {
        Self {
            slots: DashMap::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &SharedCoordinationMetrics {
        &self.metrics
    }

    /// Bind `handler` to `key`.
    ///
    /// Registering the same handler under an identical key again is a no-op.
    /// Any other registration for the same role and tag fails with
    /// [`RegistryError::DuplicateRegistration`].
    pub fn register(&self, key: MatchKey, handler: SharedHandler) -> Result<(), RegistryError> {
        match self.slots.entry(key.pattern()) {
            Entry::Occupied(entry) => {
                let slot = entry.get();
                if slot.key == key && same_handler(&slot.handler, &handler) {
                    Ok(())
                } else {
                    Err(RegistryError::DuplicateRegistration {
                        existing: slot.key,
                        requested: key,
                    })
                }
            }
            Entry::Vacant(entry) => {
                log::debug!("Registered quorum handler for {}", key);
                entry.insert(Arc::new(PatternSlot::new(key, handler)));
                Ok(())
            }
        }
    }

    /// Route one message to its pattern's buffer, firing the handler on quorum.
    ///
    /// Errors are per-message: the registry keeps serving every key afterwards.
    pub fn dispatch(&self, message: Message) -> Result<DispatchOutcome, RegistryError> {
        let pattern = Pattern::new(message.source_role(), message.tag());
        let slot = match self.slots.get(&pattern) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                self.metrics.record_unroutable();
                log::warn!(
                    "Dropping unroutable {} from {} ({})",
                    message.tag(),
                    message.source,
                    message.correlation
                );
                return Err(RegistryError::UnroutableMessage {
                    source: message.source,
                    tag: message.tag(),
                });
            }
        };
        slot.accept(message, &self.metrics)
    }

    pub fn is_registered(&self, role: Role, tag: MessageTag) -> bool {
        self.slots.contains_key(&Pattern::new(role, tag))
    }

    /// Registered keys, sorted.
    pub fn registrations(&self) -> Vec<MatchKey> {
        let mut keys: Vec<MatchKey> = self.slots.iter().map(|e| e.value().key).collect();
        keys.sort();
        keys
    }

    /// Number of messages in the open buffer for `role`/`tag`.
    ///
    /// Blocks while a handler for that key is running.
    pub fn buffered(&self, role: Role, tag: MessageTag) -> Option<usize> {
        let slot = self
            .slots
            .get(&Pattern::new(role, tag))
            .map(|e| Arc::clone(e.value()))?;
        let len = slot.buffer.lock().messages.len();
        Some(len)
    }

    /// Non-blocking snapshot of every registration's open buffer.
    pub fn pending(&self) -> Vec<PendingQuorum> {
        let slots: Vec<Arc<PatternSlot>> =
            self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        let mut pending: Vec<PendingQuorum> = slots.iter().map(|s| s.pending()).collect();
        pending.sort_by_key(|p| p.key);
        pending
    }

    /// Keys whose open buffer has been waiting longer than `window`.
    ///
    /// Intended for an external watchdog; nothing here times out on its own.
    pub fn stalled(&self, window: Duration) -> Vec<StalledQuorum> {
        self.pending()
            .into_iter()
            .filter_map(|p| match p.oldest {
                Some(waiting) if waiting > window => Some(StalledQuorum {
                    key: p.key,
                    buffered: p.buffered,
                    waiting,
                }),
                _ => None,
            })
            .collect()
    }
}
