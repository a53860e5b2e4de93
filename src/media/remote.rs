//! Observable projection of a peer's remote media

use serde::Serialize;

/// What the session currently knows about one peer's remote stream.
///
/// Updated in place as tracks arrive; pruned when the peer is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStreamInfo {
    /// Peer the stream belongs to
    pub peer_id: String,

    /// Stream identity announced by the remote side
    pub stream_id: String,

    /// Most recent remote audio track, if any
    pub audio_track_id: Option<String>,

    /// Most recent remote video track, if any
    pub video_track_id: Option<String>,
}

impl RemoteStreamInfo {
    /// An empty record for a peer whose media has not arrived yet
    pub fn new(peer_id: String, stream_id: String) -> Self {
        Self {
            peer_id,
            stream_id,
            audio_track_id: None,
            video_track_id: None,
        }
    }
}
