//! The explicit signaling state machine shared by every handler
//!
//! The engine tracks this state itself, but each handler needs to validate a
//! transition *before* attempting it, so the five-state machine (plus
//! `Closed`) lives here as one table instead of ad hoc comparisons spread
//! across handlers.

use std::fmt;
use webrtc::peer_connection::signaling_state::RTCSignalingState;

/// Signaling state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No offer/answer exchange in progress
    Stable,
    /// A local offer was applied, awaiting the remote answer
    HaveLocalOffer,
    /// A remote offer was applied, an answer is owed
    HaveRemoteOffer,
    /// A local provisional answer was applied
    HaveLocalPranswer,
    /// A remote provisional answer was applied
    HaveRemotePranswer,
    /// The connection is closed; no transition is valid
    Closed,
}

/// A negotiation step a handler wants to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOp {
    /// Create an offer and set it as local description
    SendOffer,
    /// Apply a received offer as remote description
    ApplyRemoteOffer,
    /// Apply a received answer as remote description
    ApplyRemoteAnswer,
}

impl SignalingState {
    /// Whether `op` is a valid transition out of this state.
    ///
    /// This is the single guard table behind every handler: a second offer
    /// while one is in flight, and an answer applied to a stable or closed
    /// connection, are both rejected here before the engine ever sees them.
    pub fn permits(self, op: NegotiationOp) -> bool {
        match op {
            NegotiationOp::SendOffer => matches!(self, SignalingState::Stable),
            NegotiationOp::ApplyRemoteOffer => {
                matches!(self, SignalingState::Stable | SignalingState::HaveRemoteOffer)
            }
            NegotiationOp::ApplyRemoteAnswer => {
                !matches!(self, SignalingState::Stable | SignalingState::Closed)
            }
        }
    }

    /// Whether an answer may be created from this state (a remote offer, or
    /// a local provisional answer, is in place)
    pub fn ready_to_answer(self) -> bool {
        matches!(
            self,
            SignalingState::HaveRemoteOffer | SignalingState::HaveLocalPranswer
        )
    }
}

impl From<RTCSignalingState> for SignalingState {
    fn from(state: RTCSignalingState) -> Self {
        match state {
            RTCSignalingState::Stable => SignalingState::Stable,
            RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
            RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
            RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
            // Unspecified never occurs on a live connection; treat it as
            // terminal so no transition is permitted from it.
            RTCSignalingState::Closed | RTCSignalingState::Unspecified => SignalingState::Closed,
        }
    }
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalingState::Stable => "stable",
            SignalingState::HaveLocalOffer => "have-local-offer",
            SignalingState::HaveRemoteOffer => "have-remote-offer",
            SignalingState::HaveLocalPranswer => "have-local-pranswer",
            SignalingState::HaveRemotePranswer => "have-remote-pranswer",
            SignalingState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}
