//! Behavioral tests for the pattern registry.
//!
//! # Test Organization
//!
//! - `registration_tests`: key construction and duplicate registration policy
//! - `quorum_tests`: firing, ordering, reset and duplicate-source rejection
//! - `isolation_tests`: independence of keys, handler failures
//! - `concurrency_tests`: multi-threaded dispatch and per-key serialization
//! - `supervision_tests`: pending/stalled snapshots
//! - `proptest_quorum`: arbitrary quorum sizes and arrival orders

use super::*;
use crate::messages::{
    AgentId, CorrelationId, Experience, Message, MessageTag, Payload, PeerId, PerformanceReport,
    Role,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// =============================================================================
// TEST UTILITIES
// =============================================================================

fn handler<F>(f: F) -> SharedHandler
where
    F: Fn(&MatchKey, Vec<Message>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn submission(actor: usize, id: u64) -> Message {
    Message::new(
        PeerId::actor(actor),
        CorrelationId(id),
        Payload::Submission {
            experience: Experience::new(),
            performance: PerformanceReport::new(actor as f32, 1),
        },
    )
}

fn query(actor: usize, id: u64) -> Message {
    Message::new(
        PeerId::actor(actor),
        CorrelationId(id),
        Payload::Query {
            agent_id: AgentId::new("a"),
            state: vec![actor as f32],
        },
    )
}

fn submit_key(n: usize) -> MatchKey {
    MatchKey::new(Role::Actor, MessageTag::SubmitExperience, n).unwrap()
}

fn query_key(n: usize) -> MatchKey {
    MatchKey::new(Role::Actor, MessageTag::QueryAction, n).unwrap()
}

/// Handler that records the source order of every batch it receives.
fn recording_handler() -> (SharedHandler, Arc<Mutex<Vec<Vec<PeerId>>>>) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let h = handler(move |_key: &MatchKey, messages: Vec<Message>| {
        sink.lock().push(messages.iter().map(|m| m.source).collect());
        Ok(())
    });
    (h, fired)
}

// =============================================================================
// REGISTRATION
// =============================================================================

mod registration_tests {
    use super::*;

    #[test]
    fn test_zero_required_count_rejected() {
        let err = MatchKey::new(Role::Actor, MessageTag::QueryAction, 0).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidQuorum {
                role: Role::Actor,
                tag: MessageTag::QueryAction
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_match_key_display() {
        assert_eq!(submit_key(3).to_string(), "actor:submit_experience:3");
        assert_eq!(submit_key(3).pattern().to_string(), "actor:submit_experience");
    }

    #[test]
    fn test_same_handler_same_key_is_idempotent() {
        let registry = PatternRegistry::new();
        let (h, _) = recording_handler();
        registry.register(submit_key(2), Arc::clone(&h)).unwrap();
        registry.register(submit_key(2), h).unwrap();
        assert_eq!(registry.registrations(), vec![submit_key(2)]);
    }

    #[test]
    fn test_different_handler_same_pattern_rejected() {
        let registry = PatternRegistry::new();
        let (first, _) = recording_handler();
        let (second, _) = recording_handler();
        registry.register(submit_key(2), first).unwrap();

        let err = registry.register(submit_key(2), second).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateRegistration {
                existing: submit_key(2),
                requested: submit_key(2)
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_same_handler_different_count_rejected() {
        let registry = PatternRegistry::new();
        let (h, _) = recording_handler();
        registry.register(submit_key(2), Arc::clone(&h)).unwrap();

        let err = registry.register(submit_key(3), h).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration { .. }));
        // Original registration is untouched
        assert_eq!(registry.registrations(), vec![submit_key(2)]);
    }

    #[test]
    fn test_one_handler_may_serve_two_patterns() {
        let registry = PatternRegistry::new();
        let (h, _) = recording_handler();
        registry.register(submit_key(2), Arc::clone(&h)).unwrap();
        registry.register(query_key(2), h).unwrap();
        assert!(registry.is_registered(Role::Actor, MessageTag::SubmitExperience));
        assert!(registry.is_registered(Role::Actor, MessageTag::QueryAction));
        assert!(!registry.is_registered(Role::Trainer, MessageTag::ActionReply));
    }
}

// =============================================================================
// QUORUM BEHAVIOR
// =============================================================================

mod quorum_tests {
    use super::*;

    #[test]
    fn test_fires_once_in_arrival_order() {
        let registry = PatternRegistry::new();
        let (h, fired) = recording_handler();
        registry.register(submit_key(3), h).unwrap();

        // C, A, B
        assert_eq!(
            registry.dispatch(submission(2, 1)).unwrap(),
            DispatchOutcome::Buffered {
                buffered: 1,
                required: 3
            }
        );
        registry.dispatch(submission(0, 2)).unwrap();
        assert_eq!(
            registry.dispatch(submission(1, 3)).unwrap(),
            DispatchOutcome::Fired { delivered: 3 }
        );

        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(
            fired[0],
            vec![PeerId::actor(2), PeerId::actor(0), PeerId::actor(1)]
        );
        assert_eq!(
            registry.buffered(Role::Actor, MessageTag::SubmitExperience),
            Some(0)
        );
    }

    #[test]
    fn test_duplicate_source_rejected_before_completion() {
        let registry = PatternRegistry::new();
        let (h, fired) = recording_handler();
        registry.register(submit_key(3), h).unwrap();

        registry.dispatch(submission(2, 1)).unwrap();
        registry.dispatch(submission(0, 2)).unwrap();

        let err = registry.dispatch(submission(0, 3)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnexpectedDuplicateSource {
                key: submit_key(3),
                source: PeerId::actor(0),
                correlation: CorrelationId(3),
            }
        );
        assert!(!err.is_fatal());
        assert!(fired.lock().is_empty());
        assert_eq!(
            registry.buffered(Role::Actor, MessageTag::SubmitExperience),
            Some(2)
        );

        // The legitimate quorum still completes with the original message from actor 0
        registry.dispatch(submission(1, 4)).unwrap();
        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(
            fired[0],
            vec![PeerId::actor(2), PeerId::actor(0), PeerId::actor(1)]
        );
        assert_eq!(registry.metrics().duplicates_rejected(), 1);
    }

    #[test]
    fn test_message_after_fire_opens_next_round() {
        let registry = PatternRegistry::new();
        let (h, fired) = recording_handler();
        registry.register(submit_key(2), h).unwrap();

        registry.dispatch(submission(0, 1)).unwrap();
        registry.dispatch(submission(1, 2)).unwrap();
        // Same source is fine once the previous round has been released
        assert_eq!(
            registry.dispatch(submission(0, 3)).unwrap(),
            DispatchOutcome::Buffered {
                buffered: 1,
                required: 2
            }
        );
        registry.dispatch(submission(1, 4)).unwrap();

        assert_eq!(fired.lock().len(), 2);
    }

    #[test]
    fn test_required_count_one_fires_every_message() {
        let registry = PatternRegistry::new();
        let (h, fired) = recording_handler();
        registry.register(submit_key(1), h).unwrap();

        for i in 0..4 {
            assert_eq!(
                registry.dispatch(submission(0, i)).unwrap(),
                DispatchOutcome::Fired { delivered: 1 }
            );
        }
        assert_eq!(fired.lock().len(), 4);
    }

    #[test]
    fn test_buffer_never_exceeds_required() {
        struct MaxTracker {
            max_seen: AtomicUsize,
        }
        impl QuorumHandler for MaxTracker {
            fn on_quorum(&self, _: &MatchKey, messages: Vec<Message>) -> Result<(), HandlerError> {
                self.max_seen.fetch_max(messages.len(), Ordering::SeqCst);
                Ok(())
            }
            fn on_buffered(&self, _: &MatchKey, buffered: usize) {
                self.max_seen.fetch_max(buffered, Ordering::SeqCst);
            }
        }

        let tracker = Arc::new(MaxTracker {
            max_seen: AtomicUsize::new(0),
        });
        let registry = PatternRegistry::new();
        registry
            .register(submit_key(3), Arc::clone(&tracker) as SharedHandler)
            .unwrap();

        for round in 0..5u64 {
            for actor in 0..3 {
                registry.dispatch(submission(actor, round * 10 + actor as u64)).unwrap();
            }
        }
        assert_eq!(tracker.max_seen.load(Ordering::SeqCst), 3);
        assert_eq!(registry.metrics().quorums_fired(), 5);
    }
}

// =============================================================================
// ISOLATION
// =============================================================================

mod isolation_tests {
    use super::*;

    #[test]
    fn test_unroutable_message_dropped() {
        let registry = PatternRegistry::new();
        let (h, fired) = recording_handler();
        registry.register(submit_key(1), h).unwrap();

        let err = registry.dispatch(query(0, 1)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnroutableMessage {
                source: PeerId::actor(0),
                tag: MessageTag::QueryAction
            }
        );
        assert!(fired.lock().is_empty());
        assert_eq!(registry.metrics().unroutable_dropped(), 1);

        // Registry keeps serving the registered key
        registry.dispatch(submission(0, 2)).unwrap();
        assert_eq!(fired.lock().len(), 1);
    }

    #[test]
    fn test_keys_do_not_share_buffers() {
        let registry = PatternRegistry::new();
        let (submit_h, submits) = recording_handler();
        let (query_h, queries) = recording_handler();
        registry.register(submit_key(2), submit_h).unwrap();
        registry.register(query_key(2), query_h).unwrap();

        // Interleave at the message level; actor 0 appears once per key
        registry.dispatch(submission(0, 1)).unwrap();
        registry.dispatch(query(0, 2)).unwrap();
        assert_eq!(
            registry.buffered(Role::Actor, MessageTag::SubmitExperience),
            Some(1)
        );
        assert_eq!(registry.buffered(Role::Actor, MessageTag::QueryAction), Some(1));

        registry.dispatch(query(1, 3)).unwrap();
        assert_eq!(queries.lock().len(), 1);
        assert!(submits.lock().is_empty());
        assert_eq!(
            registry.buffered(Role::Actor, MessageTag::SubmitExperience),
            Some(1)
        );

        registry.dispatch(submission(1, 4)).unwrap();
        assert_eq!(submits.lock().len(), 1);
    }

    #[test]
    fn test_handler_failure_consumes_round_and_registry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_h = Arc::clone(&calls);
        let h = handler(move |_: &MatchKey, _: Vec<Message>| {
            if calls_h.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HandlerError::new("learning step diverged"))
            } else {
                Ok(())
            }
        });

        let registry = PatternRegistry::new();
        registry.register(submit_key(2), h).unwrap();

        registry.dispatch(submission(0, 1)).unwrap();
        let err = registry.dispatch(submission(1, 2)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::HandlerFailed {
                key: submit_key(2),
                reason: "learning step diverged".to_string()
            }
        );
        assert_eq!(
            registry.buffered(Role::Actor, MessageTag::SubmitExperience),
            Some(0)
        );

        registry.dispatch(submission(0, 3)).unwrap();
        assert_eq!(
            registry.dispatch(submission(1, 4)).unwrap(),
            DispatchOutcome::Fired { delivered: 2 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.metrics().snapshot().handler_failures, 1);
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_dispatch_across_keys() {
        const ACTORS: usize = 8;
        const ROUNDS: usize = 25;

        let registry = Arc::new(PatternRegistry::new());
        let (submit_h, submits) = recording_handler();
        let (query_h, queries) = recording_handler();
        registry.register(submit_key(ACTORS), submit_h).unwrap();
        registry.register(query_key(ACTORS), query_h).unwrap();

        // Each actor thread sends one submission and one query per round; a
        // barrier keeps rounds from overlapping per key.
        let barrier = Arc::new(std::sync::Barrier::new(ACTORS));
        let threads: Vec<_> = (0..ACTORS)
            .map(|actor| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        let id = (round * ACTORS + actor) as u64 * 2;
                        registry.dispatch(query(actor, id)).unwrap();
                        registry.dispatch(submission(actor, id + 1)).unwrap();
                        barrier.wait();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        for batches in [submits.lock(), queries.lock()] {
            assert_eq!(batches.len(), ROUNDS);
            for batch in batches.iter() {
                let mut sources = batch.clone();
                sources.sort();
                assert_eq!(sources, (0..ACTORS).map(PeerId::actor).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_handler_invocations_never_overlap_per_key() {
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let (flag, count) = (Arc::clone(&in_flight), Arc::clone(&overlaps));
        let h = handler(move |_: &MatchKey, _: Vec<Message>| {
            if flag.swap(true, Ordering::SeqCst) {
                count.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
            flag.store(false, Ordering::SeqCst);
            Ok(())
        });

        let registry = Arc::new(PatternRegistry::new());
        registry.register(submit_key(1), h).unwrap();

        let threads: Vec<_> = (0..4)
            .map(|actor| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..20 {
                        registry.dispatch(submission(actor, i)).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(registry.metrics().quorums_fired(), 80);
    }

    #[test]
    fn test_slow_handler_does_not_block_other_key() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let slow = handler(move |_: &MatchKey, _: Vec<Message>| {
            release_rx.recv().map_err(|e| HandlerError::new(e.to_string()))
        });
        let (fast, fast_fired) = recording_handler();

        let registry = Arc::new(PatternRegistry::new());
        registry.register(submit_key(1), slow).unwrap();
        registry.register(query_key(1), fast).unwrap();

        let blocked = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.dispatch(submission(0, 1)))
        };

        // Wait for the slow handler to be running
        while !registry.pending().iter().any(|p| p.in_flight) {
            thread::yield_now();
        }

        registry.dispatch(query(0, 2)).unwrap();
        assert_eq!(fast_fired.lock().len(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(
            blocked.join().unwrap().unwrap(),
            DispatchOutcome::Fired { delivered: 1 }
        );
    }
}

// =============================================================================
// SUPERVISION
// =============================================================================

mod supervision_tests {
    use super::*;

    #[test]
    fn test_pending_reports_open_buffers() {
        let registry = PatternRegistry::new();
        let (a, _) = recording_handler();
        let (b, _) = recording_handler();
        registry.register(submit_key(3), a).unwrap();
        registry.register(query_key(2), b).unwrap();

        registry.dispatch(submission(0, 1)).unwrap();
        registry.dispatch(submission(1, 2)).unwrap();

        let pending = registry.pending();
        assert_eq!(pending.len(), 2);
        let submit = pending.iter().find(|p| p.key == submit_key(3)).unwrap();
        assert_eq!(submit.buffered, 2);
        assert!(submit.oldest.is_some());
        let queries = pending.iter().find(|p| p.key == query_key(2)).unwrap();
        assert_eq!(queries.buffered, 0);
        assert!(queries.oldest.is_none());
    }

    #[test]
    fn test_stalled_reports_only_old_buffers() {
        let registry = PatternRegistry::new();
        let (a, _) = recording_handler();
        registry.register(submit_key(2), a).unwrap();

        assert!(registry.stalled(Duration::ZERO).is_empty());

        registry.dispatch(submission(0, 1)).unwrap();
        thread::sleep(Duration::from_millis(5));

        assert!(registry.stalled(Duration::from_secs(60)).is_empty());
        let stalled = registry.stalled(Duration::from_millis(1));
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].key, submit_key(2));
        assert_eq!(stalled[0].buffered, 1);

        let err: RegistryError = stalled[0].clone().into();
        assert!(err.to_string().contains("1/2"));

        // Completing the quorum clears the stall
        registry.dispatch(submission(1, 2)).unwrap();
        assert!(registry.stalled(Duration::ZERO).is_empty());
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

mod proptest_quorum {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any arrival order of N distinct sources fires exactly once,
        /// delivering every message in arrival order, and leaves the buffer empty.
        #[test]
        fn test_any_order_fires_once(
            order in (1usize..12).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
        ) {
            let n = order.len();
            let registry = PatternRegistry::new();
            let (h, fired) = recording_handler();
            registry.register(submit_key(n), h).unwrap();

            for (i, actor) in order.iter().enumerate() {
                let outcome = registry.dispatch(submission(*actor, i as u64)).unwrap();
                if i + 1 < n {
                    prop_assert_eq!(outcome, DispatchOutcome::Buffered { buffered: i + 1, required: n });
                } else {
                    prop_assert_eq!(outcome, DispatchOutcome::Fired { delivered: n });
                }
            }

            let fired = fired.lock();
            prop_assert_eq!(fired.len(), 1);
            let expected: Vec<PeerId> = order.iter().map(|a| PeerId::actor(*a)).collect();
            prop_assert_eq!(&fired[0], &expected);
            prop_assert_eq!(registry.buffered(Role::Actor, MessageTag::SubmitExperience), Some(0));
        }

        /// Property: duplicates injected anywhere before completion are rejected and
        /// never displace a missing source.
        #[test]
        fn test_duplicates_never_complete_quorum(
            n in 2usize..8,
            dup_after in 0usize..7,
        ) {
            let dup_after = dup_after % (n - 1);
            let registry = PatternRegistry::new();
            let (h, fired) = recording_handler();
            registry.register(submit_key(n), h).unwrap();

            let mut id = 0u64;
            for actor in 0..n {
                registry.dispatch(submission(actor, id)).unwrap();
                id += 1;
                if actor == dup_after {
                    let is_dup = matches!(
                        registry.dispatch(submission(0, id)),
                        Err(RegistryError::UnexpectedDuplicateSource { .. })
                    );
                    prop_assert!(is_dup);
                    id += 1;
                    prop_assert!(fired.lock().is_empty());
                }
            }

            let fired = fired.lock();
            prop_assert_eq!(fired.len(), 1);
            prop_assert_eq!(fired[0].len(), n);
        }
    }
}
