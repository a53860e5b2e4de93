//! Observable session state and its event projection

use crate::media::{LocalMedia, MediaKind, RemoteStreamInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// A non-fatal error attributed to one peer's negotiation (or to the
/// session itself when `peer_id` is `None`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedError {
    /// The peer whose negotiation failed, when known
    pub peer_id: Option<String>,

    /// Human-readable description
    pub message: String,
}

/// Mutable session state, owned by the controller
pub(crate) struct SessionState {
    /// Local stream, created once per `connect()`
    pub local_media: Option<Arc<LocalMedia>>,

    /// Whether local audio is muted
    pub is_audio_muted: bool,

    /// Whether local video is muted
    pub is_video_muted: bool,

    /// Room joined by the current `connect()`, if any
    pub room_id: Option<String>,

    /// Local participant identity for the current `connect()`, if any
    pub user_id: Option<String>,

    /// Whether a `connect()` sequence is in progress
    pub is_loading: bool,

    /// Most recent attributed error
    pub last_error: Option<AttributedError>,

    /// Per-peer remote stream projection
    pub remote_streams: HashMap<String, RemoteStreamInfo>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            local_media: None,
            is_audio_muted: false,
            is_video_muted: false,
            room_id: None,
            user_id: None,
            is_loading: false,
            last_error: None,
            remote_streams: HashMap::new(),
        }
    }
}

/// Cloneable snapshot of the observable session state
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Room joined by the current session, if any
    pub room_id: Option<String>,

    /// Local participant identity, if connected
    pub user_id: Option<String>,

    /// Whether a `connect()` sequence is in progress
    pub is_loading: bool,

    /// Whether local audio is muted
    pub is_audio_muted: bool,

    /// Whether local video is muted
    pub is_video_muted: bool,

    /// Whether a local stream is held
    pub has_local_media: bool,

    /// Most recent attributed error
    pub last_error: Option<AttributedError>,

    /// Remote streams, one entry per peer with received media
    pub remote_streams: Vec<RemoteStreamInfo>,
}

/// Events broadcast to session observers.
///
/// The same stream serves any UI binding: a reactive store subscribes once
/// and mirrors the session, a callback API forwards each event as it
/// arrives.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session joined a room
    Connected {
        /// Room that was joined
        room_id: String,
    },

    /// The session was torn down
    Disconnected,

    /// A peer entered the registry
    PeerAdded {
        /// The registered peer
        peer_id: String,
    },

    /// A peer left the registry
    PeerRemoved {
        /// The removed peer
        peer_id: String,
    },

    /// A peer's remote stream gained or replaced a track
    RemoteStreamUpdated(RemoteStreamInfo),

    /// A non-fatal negotiation error was recorded
    PeerError {
        /// The peer whose negotiation failed, when known
        peer_id: Option<String>,

        /// Human-readable description
        message: String,
    },

    /// A local mute flag changed
    MuteChanged {
        /// Which kind of track was toggled
        kind: MediaKind,

        /// The new muted state
        muted: bool,
    },
}
