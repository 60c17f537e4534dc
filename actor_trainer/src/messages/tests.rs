//! Behavioral tests for message identity and payload schemas.

use super::*;

fn query(source: PeerId, id: u64, state: Vec<f32>) -> Message {
    Message::new(
        source,
        CorrelationId(id),
        Payload::Query {
            agent_id: AgentId::new("ship"),
            state,
        },
    )
}

mod identity_tests {
    use super::*;

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId::actor(3).to_string(), "actor.3");
        assert_eq!(PeerId::trainer().to_string(), "trainer.0");
    }

    #[test]
    fn test_peer_ids_order_by_role_then_index() {
        let mut peers = vec![PeerId::trainer(), PeerId::actor(2), PeerId::actor(0)];
        peers.sort();
        assert_eq!(peers, vec![PeerId::actor(0), PeerId::actor(2), PeerId::trainer()]);
    }

    #[test]
    fn test_tag_follows_payload_variant() {
        let submission = Payload::Submission {
            experience: Experience::new(),
            performance: PerformanceReport::default(),
        };
        assert_eq!(submission.tag(), MessageTag::SubmitExperience);

        let msg = query(PeerId::actor(0), 1, vec![0.0]);
        assert_eq!(msg.tag(), MessageTag::QueryAction);
        assert_eq!(msg.source_role(), Role::Actor);

        let reply = Payload::ActionReply {
            agent_id: AgentId::new("ship"),
            action: vec![1.0],
        };
        assert_eq!(reply.tag(), MessageTag::ActionReply);
    }

    #[test]
    fn test_reply_echoes_request_correlation() {
        let request = query(PeerId::actor(1), 41, vec![0.5]);
        let reply = Message::reply_to(
            &request,
            PeerId::trainer(),
            CorrelationId(99),
            Payload::ActionReply {
                agent_id: AgentId::new("ship"),
                action: vec![0.1],
            },
        );

        assert_eq!(reply.in_reply_to, Some(CorrelationId(41)));
        assert!(reply.answers(CorrelationId(41)));
        assert!(!reply.answers(CorrelationId(99)));
        assert!(request.in_reply_to.is_none());
    }

    #[test]
    fn test_tag_display_is_snake_case() {
        assert_eq!(MessageTag::SubmitExperience.to_string(), "submit_experience");
        assert_eq!(MessageTag::QueryAction.to_string(), "query_action");
        assert_eq!(MessageTag::ActionReply.to_string(), "action_reply");
    }
}

mod payload_tests {
    use super::*;

    #[test]
    fn test_transition_batch_push_and_extend() {
        let mut a = TransitionBatch::new();
        a.push(vec![0.0], vec![1.0], 0.5, vec![0.1]);

        let mut b = TransitionBatch::new();
        b.push(vec![2.0], vec![3.0], -1.0, vec![2.1]);
        b.push(vec![4.0], vec![5.0], 2.0, vec![4.1]);

        a.extend(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.rewards, vec![0.5, -1.0, 2.0]);
        assert_eq!(a.states[2], vec![4.0]);
        assert!(a.is_consistent());
    }

    #[test]
    fn test_transition_batch_inconsistent_columns() {
        let mut batch = TransitionBatch::new();
        batch.push(vec![0.0], vec![1.0], 0.5, vec![0.1]);
        batch.actions.pop();
        assert!(!batch.is_consistent());
    }

    #[test]
    fn test_experience_counts_all_agents() {
        let mut ship = TransitionBatch::new();
        ship.push(vec![0.0], vec![0.0], 1.0, vec![0.0]);
        let mut port = TransitionBatch::new();
        port.push(vec![0.0], vec![0.0], 1.0, vec![0.0]);
        port.push(vec![0.0], vec![0.0], 1.0, vec![0.0]);

        let experience = Experience::new().with_agent("ship", ship).with_agent("port", port);
        assert_eq!(experience.transitions(), 3);
        assert_eq!(experience.per_agent.len(), 2);
    }
}

mod thread_safety_tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_message_is_send_sync() {
        assert_send_sync::<Message>();
        assert_send_sync::<Payload>();
        assert_send_sync::<PeerId>();
    }
}
