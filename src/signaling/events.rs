//! Signaling event names and payload types
//!
//! The wire contract is symmetric per room: outbound events are targeted at
//! one peer (`targetUserId`) or announce membership; inbound events carry the
//! sender's transport-assigned socket identity. All payloads are JSON with
//! camelCase keys, so they interoperate with browser-side peers unchanged.

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Outbound: announce room membership
pub const JOIN_VIDEO_ROOM: &str = "join_video_room";
/// Outbound: SDP offer targeted at one peer
pub const SEND_OFFER: &str = "send_offer";
/// Outbound: SDP answer targeted at one peer
pub const SEND_ANSWER: &str = "send_answer";
/// Outbound: ICE candidate targeted at one peer
pub const SEND_CANDIDATE: &str = "send_candidate";

/// Inbound: a new participant joined the room
pub const USER_JOINED: &str = "user_joined";
/// Inbound: snapshot of participants already in the room
pub const EXISTING_USERS_IN_ROOM: &str = "existing_users_in_room";
/// Inbound: SDP offer from a remote peer
pub const RECEIVE_OFFER: &str = "receive_offer";
/// Inbound: SDP answer from a remote peer
pub const RECEIVE_ANSWER: &str = "receive_answer";
/// Inbound: ICE candidate from a remote peer
pub const RECEIVE_CANDIDATE: &str = "receive_candidate";
/// Inbound: a participant left the room
pub const USER_LEFT: &str = "user_left";

/// Every inbound event a session registers a handler for
pub const INBOUND_EVENTS: [&str; 6] = [
    USER_JOINED,
    EXISTING_USERS_IN_ROOM,
    RECEIVE_OFFER,
    RECEIVE_ANSWER,
    RECEIVE_CANDIDATE,
    USER_LEFT,
];

/// Payload for `join_video_room`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    /// Room being joined
    pub room_id: String,

    /// Application-level identity of the local participant
    pub user_id: String,
}

/// Payload for `send_offer` / `send_answer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedDescription {
    /// Room the negotiation belongs to
    pub room_id: String,

    /// Socket identity of the peer this description is for
    pub target_user_id: String,

    /// The local session description (`{type, sdp}` on the wire)
    pub payload: RTCSessionDescription,
}

/// Payload for `send_candidate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedCandidate {
    /// Room the negotiation belongs to
    pub room_id: String,

    /// Socket identity of the peer this candidate is for
    pub target_user_id: String,

    /// The gathered local ICE candidate
    pub payload: RTCIceCandidateInit,
}

/// One participant as reported by `user_joined` / `existing_users_in_room`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    /// Transport-assigned socket identity
    pub socket_id: String,

    /// Application-level identity, when the server knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Payload for `receive_offer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferFrom {
    /// Socket identity of the offering peer
    pub sender_socket_id: String,

    /// The remote offer
    pub offer: RTCSessionDescription,
}

/// Payload for `receive_answer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFrom {
    /// Socket identity of the answering peer
    pub sender_socket_id: String,

    /// The remote answer
    pub answer: RTCSessionDescription,
}

/// Payload for `receive_candidate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFrom {
    /// Socket identity of the peer the candidate came from
    pub sender_socket_id: String,

    /// The remote ICE candidate
    pub candidate: RTCIceCandidateInit,
}

/// Payload for `user_left`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    /// Socket identity of the departed participant
    pub socket_id: String,
}
