//! The guards that keep negotiation recoverable under duplicate,
//! out-of-order, and self-addressed signaling

mod common;

use common::{answer_for, connected_session};
use roomlink_webrtc::signaling::events;
use roomlink_webrtc::signaling::ForwardedDescription;
use roomlink_webrtc::SignalingState;
use serde_json::json;

#[tokio::test]
async fn test_duplicate_user_joined_sends_one_offer() {
    let (session, transport) = connected_session("room-1", "alice").await;

    transport
        .deliver(events::USER_JOINED, json!({"socketId": "A"}))
        .await;
    transport
        .deliver(events::USER_JOINED, json!({"socketId": "A"}))
        .await;

    // Exactly one offer for A; the duplicate is dropped silently.
    assert_eq!(transport.sent_of(events::SEND_OFFER).await.len(), 1);
    assert_eq!(session.peer_count().await, 1);
    assert!(session.snapshot().await.last_error.is_none());
}

#[tokio::test]
async fn test_stale_answer_is_dropped() {
    let (session, transport) = connected_session("room-1", "alice").await;

    transport
        .deliver(events::USER_JOINED, json!({"socketId": "A"}))
        .await;

    let offer = transport.sent_of(events::SEND_OFFER).await.remove(0);
    let forwarded: ForwardedDescription = serde_json::from_value(offer).unwrap();
    let answer = serde_json::to_value(&answer_for(&forwarded.payload).await).unwrap();

    transport
        .deliver(
            events::RECEIVE_ANSWER,
            json!({"senderSocketId": "A", "answer": answer.clone()}),
        )
        .await;
    assert_eq!(
        session.peer_signaling_state("A").await,
        Some(SignalingState::Stable)
    );

    // The same answer again, after the connection reached stable: dropped
    // without an error and without touching the connection.
    transport
        .deliver(
            events::RECEIVE_ANSWER,
            json!({"senderSocketId": "A", "answer": answer}),
        )
        .await;

    assert_eq!(
        session.peer_signaling_state("A").await,
        Some(SignalingState::Stable)
    );
    assert!(session.snapshot().await.last_error.is_none());
    assert_eq!(session.peer_count().await, 1);
}

#[tokio::test]
async fn test_answer_for_unknown_peer_is_ignored() {
    let (session, transport) = connected_session("room-1", "alice").await;

    transport
        .deliver(
            events::RECEIVE_ANSWER,
            json!({
                "senderSocketId": "stranger",
                "answer": {"type": "answer", "sdp": "v=0\r\n"},
            }),
        )
        .await;

    assert_eq!(session.peer_count().await, 0);
    assert!(session.snapshot().await.last_error.is_none());
}

#[tokio::test]
async fn test_self_messages_produce_no_mutation() {
    let (session, transport) = connected_session("room-1", "C").await;

    transport
        .deliver(events::USER_JOINED, json!({"socketId": "C"}))
        .await;
    transport
        .deliver(
            events::EXISTING_USERS_IN_ROOM,
            json!([{"socketId": "C", "userId": "C"}]),
        )
        .await;
    transport
        .deliver(
            events::RECEIVE_OFFER,
            json!({
                "senderSocketId": "C",
                "offer": {"type": "offer", "sdp": "v=0\r\n"},
            }),
        )
        .await;
    transport
        .deliver(
            events::RECEIVE_CANDIDATE,
            json!({"senderSocketId": "C", "candidate": {"candidate": ""}}),
        )
        .await;

    assert_eq!(session.peer_count().await, 0);
    assert!(transport.sent_of(events::SEND_OFFER).await.is_empty());
    assert!(transport.sent_of(events::SEND_ANSWER).await.is_empty());
    assert!(session.snapshot().await.last_error.is_none());
}

#[tokio::test]
async fn test_user_left_twice_shrinks_once() {
    let (session, transport) = connected_session("room-1", "alice").await;

    transport
        .deliver(events::USER_JOINED, json!({"socketId": "A"}))
        .await;
    assert_eq!(session.peer_count().await, 1);

    transport
        .deliver(events::USER_LEFT, json!({"socketId": "A"}))
        .await;
    transport
        .deliver(events::USER_LEFT, json!({"socketId": "A"}))
        .await;

    assert_eq!(session.peer_count().await, 0);
}

#[tokio::test]
async fn test_user_left_for_unknown_peer_is_noop() {
    let (session, transport) = connected_session("room-1", "alice").await;

    transport
        .deliver(events::USER_LEFT, json!({"socketId": "ghost"}))
        .await;

    assert_eq!(session.peer_count().await, 0);
    assert!(session.snapshot().await.last_error.is_none());
}

#[tokio::test]
async fn test_candidate_ahead_of_remote_description_is_nonfatal() {
    let (session, transport) = connected_session("room-1", "alice").await;

    // We offered to A; no remote description is in place yet, so the
    // engine rejects the candidate. That is an attributed, non-fatal
    // error: the peer stays registered and negotiation can continue.
    transport
        .deliver(events::USER_JOINED, json!({"socketId": "A"}))
        .await;
    transport
        .deliver(
            events::RECEIVE_CANDIDATE,
            json!({
                "senderSocketId": "A",
                "candidate": {
                    "candidate": "candidate:1 1 udp 2130706431 192.0.2.7 50000 typ host",
                    "sdpMid": "0",
                },
            }),
        )
        .await;

    let snapshot = session.snapshot().await;
    let error = snapshot.last_error.expect("attributed error recorded");
    assert_eq!(error.peer_id.as_deref(), Some("A"));

    assert_eq!(session.peer_count().await, 1);
    assert_eq!(
        session.peer_signaling_state("A").await,
        Some(SignalingState::HaveLocalOffer)
    );
}
