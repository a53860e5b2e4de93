//! Local track handles and the injected acquisition trait

use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A local track handle: the engine-side track plus an enabled flag.
///
/// The flag does not tear the sender down; a muted track keeps its
/// transceiver so unmuting needs no renegotiation. The host's sample pump
/// must check [`LocalTrack::is_enabled`] before writing samples.
pub struct LocalTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    track: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    /// Create an Opus audio track
    pub fn audio(id: &str, stream_id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            id.to_string(),
            stream_id.to_string(),
        ));

        Self {
            kind: MediaKind::Audio,
            enabled: AtomicBool::new(true),
            track,
        }
    }

    /// Create a VP8 video track
    pub fn video(id: &str, stream_id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "video/VP8".to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            id.to_string(),
            stream_id.to_string(),
        ));

        Self {
            kind: MediaKind::Video,
            enabled: AtomicBool::new(true),
            track,
        }
    }

    /// Kind of this track
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Track identifier (unique within the stream)
    pub fn id(&self) -> &str {
        self.track.id()
    }

    /// Whether the host should currently be feeding samples
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Flip the enabled flag
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// The engine-side track, for attaching as a sender
    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.track) as Arc<dyn TrackLocal + Send + Sync>
    }

    /// The concrete sample track, for the host's sample pump
    pub fn sample_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }
}

/// The local media stream: one bundle of tracks shared read-only by every
/// peer connection in the session.
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<Arc<LocalTrack>>,
}

impl LocalMedia {
    /// Bundle tracks under one stream identity
    pub fn new(stream_id: String, tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self { stream_id, tracks }
    }

    /// Stream identifier shared by all tracks
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// All tracks in the stream
    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    /// Flip the enabled flag on every track of `kind`.
    ///
    /// Returns the number of tracks affected.
    pub fn set_kind_enabled(&self, kind: MediaKind, enabled: bool) -> usize {
        let mut affected = 0;
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
            affected += 1;
        }
        affected
    }

    /// Stop the stream: disable every track so no further samples flow.
    ///
    /// Capture resources are owned by the [`LocalMediaSource`]
    /// implementation and released when the host drops its side.
    pub fn stop(&self) {
        debug!(stream_id = %self.stream_id, "stopping local media");
        for track in &self.tracks {
            track.set_enabled(false);
        }
    }
}

/// Injected local media acquisition.
///
/// `acquire` is called once per `connect()`; failures are fatal to the
/// connect and surface as [`Error::MediaError`](crate::Error::MediaError).
#[async_trait]
pub trait LocalMediaSource: Send + Sync {
    /// Acquire the local audio+video stream
    async fn acquire(&self) -> Result<LocalMedia>;
}

/// Default media source: one Opus audio track and one VP8 video track with
/// fresh identifiers, no capture devices required. Suitable for tests and
/// for hosts that feed samples themselves.
#[derive(Debug, Default)]
pub struct StaticMediaSource;

#[async_trait]
impl LocalMediaSource for StaticMediaSource {
    async fn acquire(&self) -> Result<LocalMedia> {
        let stream_id = format!("stream-{}", uuid::Uuid::new_v4());
        let tracks = vec![
            Arc::new(LocalTrack::audio(
                &format!("audio-{}", uuid::Uuid::new_v4()),
                &stream_id,
            )),
            Arc::new(LocalTrack::video(
                &format!("video-{}", uuid::Uuid::new_v4()),
                &stream_id,
            )),
        ];

        Ok(LocalMedia::new(stream_id, tracks))
    }
}
