//! Error types for the room session core

/// Result type alias using the crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in room session operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling transport error (connect failure, auth rejection, emit failure)
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// Local media acquisition error (permission denial, device unavailable)
    #[error("Media error: {0}")]
    MediaError(String),

    /// Peer not found in the registry
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// Negotiation attempted from a signaling state that forbids it
    #[error("Invalid signaling state: {0}")]
    InvalidSignalingState(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidateError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is fatal to `connect()` (transport or media failure)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::SignalingError(_) | Error::MediaError(_)
        )
    }

    /// Check if this error is scoped to a single peer's negotiation
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            Error::PeerNotFound(_)
                | Error::PeerConnectionError(_)
                | Error::SdpError(_)
                | Error::InvalidSignalingState(_)
                | Error::IceCandidateError(_)
        )
    }
}
