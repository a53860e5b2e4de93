//! Signaling contract: wire event types and the injected transport trait

pub mod events;
pub mod transport;

pub use events::{
    AnswerFrom, CandidateFrom, ForwardedCandidate, ForwardedDescription, JoinRoom, OfferFrom,
    RoomMember, UserLeft,
};
pub use transport::{EventHandler, SignalingTransport};
