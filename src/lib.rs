//! Multi-peer WebRTC signaling and connection lifecycle for room-based calls
//!
//! This crate is the protocol core of a mesh video call: it negotiates SDP
//! offers/answers and ICE candidates over an out-of-band signaling channel,
//! keeps one connection record per remote peer, and survives the signaling
//! realities of a real room: duplicate joins, stale answers, candidates
//! racing ahead of the SDP, peers vanishing without a goodbye.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Host application (any UI binding)                       │
//! │  ↓ connect / disconnect / toggle          ↑ events       │
//! │  RoomSession                                             │
//! │  ├─ SignalingTransport (injected channel, one per room)  │
//! │  ├─ LocalMediaSource   (injected acquisition)            │
//! │  ├─ PeerRegistry       (peer id → PeerRecord, the arena) │
//! │  │   └─ PeerRecord     (owned RTCPeerConnection + remote │
//! │  │                      stream bookkeeping)              │
//! │  └─ Signaling handlers (guarded by SignalingState table) │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Both external dependencies are injected: the signaling transport (any
//! bus that can send named JSON events) and local media acquisition. The
//! media transport itself (packetization, encryption, congestion control)
//! belongs to the `webrtc` engine and is consumed only through its standard
//! offer/answer/ICE primitives.
//!
//! # Example
//!
//! ```no_run
//! use roomlink_webrtc::{RoomConfig, RoomSession, SignalingTransport};
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn SignalingTransport>) -> roomlink_webrtc::Result<()> {
//! let session = RoomSession::with_default_media(RoomConfig::default(), transport)?;
//!
//! session.connect("standup", "auth-token", "alice").await?;
//! let muted = session.toggle_audio().await;
//! assert!(muted);
//!
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

// Re-exports for the public API
pub use config::{RoomConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use media::{
    LocalMedia, LocalMediaSource, LocalTrack, MediaKind, RemoteStreamInfo, StaticMediaSource,
};
pub use peer::{NegotiationOp, PeerRecord, PeerRegistry, SignalingState};
pub use session::{AttributedError, RoomSession, SessionEvent, SessionSnapshot};
pub use signaling::{EventHandler, SignalingTransport};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
    }
}
