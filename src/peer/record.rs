//! Per-peer connection record

use crate::config::RoomConfig;
use crate::media::{LocalMedia, RemoteStreamInfo};
use crate::peer::{NegotiationOp, SignalingState};
use crate::{Error, Result};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Per-remote-peer state: the owned peer connection, the negotiated remote
/// stream, and lookup-only references to the last-known remote tracks.
///
/// Exactly one record exists per peer id; the registry entry owns it and is
/// the only place it is closed.
#[derive(Debug)]
pub struct PeerRecord {
    /// Remote participant's transport-assigned identity
    peer_id: String,

    /// The owned engine connection
    connection: Arc<RTCPeerConnection>,

    /// Most recently received remote stream, updated in place
    remote_stream: RwLock<Option<RemoteStreamInfo>>,

    /// Last-known remote audio track (lookup only, not ownership)
    remote_audio_track: RwLock<Weak<TrackRemote>>,

    /// Last-known remote video track (lookup only, not ownership)
    remote_video_track: RwLock<Weak<TrackRemote>>,
}

impl PeerRecord {
    /// Create the engine connection for one remote peer
    ///
    /// # Arguments
    ///
    /// * `peer_id` - Identity of the remote peer
    /// * `config` - STUN/TURN server configuration
    pub async fn new(peer_id: String, config: &RoomConfig) -> Result<Self> {
        debug!("Creating peer connection for {}", peer_id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
        })?);

        Ok(Self {
            peer_id,
            connection,
            remote_stream: RwLock::new(None),
            remote_audio_track: RwLock::new(Weak::new()),
            remote_video_track: RwLock::new(Weak::new()),
        })
    }

    /// Identity of the remote peer
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The underlying engine connection
    pub fn connection(&self) -> &Arc<RTCPeerConnection> {
        &self.connection
    }

    /// Current signaling state
    pub fn signaling_state(&self) -> SignalingState {
        SignalingState::from(self.connection.signaling_state())
    }

    fn ensure_permits(&self, op: NegotiationOp) -> Result<()> {
        let state = self.signaling_state();
        if state.permits(op) {
            Ok(())
        } else {
            Err(Error::InvalidSignalingState(format!(
                "peer {}: {:?} not valid in state {}",
                self.peer_id, op, state
            )))
        }
    }

    /// Attach every local track as a sender, skipping tracks that already
    /// have one on this connection (safe to call more than once).
    pub async fn attach_local_tracks(&self, media: &LocalMedia) -> Result<()> {
        let mut attached = Vec::new();
        for sender in self.connection.get_senders().await {
            if let Some(track) = sender.track().await {
                attached.push(track.id().to_string());
            }
        }

        for local in media.tracks() {
            if attached.iter().any(|id| id == local.id()) {
                debug!(
                    "Track {} already has a sender on peer {}, skipping",
                    local.id(),
                    self.peer_id
                );
                continue;
            }

            self.connection
                .add_track(local.rtc_track())
                .await
                .map_err(|e| {
                    Error::PeerConnectionError(format!(
                        "Failed to add {} track for peer {}: {}",
                        local.kind(),
                        self.peer_id,
                        e
                    ))
                })?;
        }

        Ok(())
    }

    /// Create an offer and set it as local description
    ///
    /// Only valid in `stable`; the returned description is what goes on the
    /// wire. A failure here typically leaves the state `stable`, so a later
    /// retry via a fresh `user_joined` is safe.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        self.ensure_permits(NegotiationOp::SendOffer)?;

        let offer = self
            .connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        self.connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local_desc = self.connection.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting offer".to_string())
        })?;

        debug!("Created offer for peer {}", self.peer_id);

        Ok(local_desc)
    }

    /// Apply a received offer as remote description
    pub async fn apply_remote_offer(&self, offer: RTCSessionDescription) -> Result<()> {
        self.ensure_permits(NegotiationOp::ApplyRemoteOffer)?;

        self.connection
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote offer: {}", e)))?;

        Ok(())
    }

    /// Create an answer to the applied remote offer and set it as local
    /// description
    pub async fn create_answer(&self) -> Result<RTCSessionDescription> {
        let state = self.signaling_state();
        if !state.ready_to_answer() {
            return Err(Error::InvalidSignalingState(format!(
                "peer {}: cannot create answer in state {}",
                self.peer_id, state
            )));
        }

        let answer = self
            .connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        self.connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local_desc = self.connection.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting answer".to_string())
        })?;

        debug!("Created answer for peer {}", self.peer_id);

        Ok(local_desc)
    }

    /// Apply a received answer as remote description.
    ///
    /// Requires that an offer was actually sent: the state must accept a
    /// remote answer and a local description must be in place.
    pub async fn apply_remote_answer(&self, answer: RTCSessionDescription) -> Result<()> {
        self.ensure_permits(NegotiationOp::ApplyRemoteAnswer)?;

        if !self.has_local_description().await {
            return Err(Error::InvalidSignalingState(format!(
                "peer {}: answer received but no local offer is in place",
                self.peer_id
            )));
        }

        self.connection
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote answer: {}", e)))?;

        debug!("Applied remote answer from peer {}", self.peer_id);

        Ok(())
    }

    /// Whether a local description (pending or current) is in place
    pub async fn has_local_description(&self) -> bool {
        self.connection.local_description().await.is_some()
    }

    /// Add a remote ICE candidate
    pub async fn add_remote_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.connection
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    /// Record an arriving remote track and return the updated stream info.
    ///
    /// The stream record is updated in place; the track references are weak
    /// (the engine owns the tracks).
    pub async fn note_remote_track(&self, track: &Arc<TrackRemote>) -> RemoteStreamInfo {
        let stream_id = track.stream_id().to_string();
        let track_id = track.id().to_string();

        let mut guard = self.remote_stream.write().await;
        let info = guard
            .get_or_insert_with(|| RemoteStreamInfo::new(self.peer_id.clone(), stream_id.clone()));
        info.stream_id = stream_id;

        match track.kind() {
            RTPCodecType::Audio => {
                info.audio_track_id = Some(track_id);
                *self.remote_audio_track.write().await = Arc::downgrade(track);
            }
            RTPCodecType::Video => {
                info.video_track_id = Some(track_id);
                *self.remote_video_track.write().await = Arc::downgrade(track);
            }
            _ => {}
        }

        info.clone()
    }

    /// Current remote stream info, if media has arrived
    pub async fn remote_stream(&self) -> Option<RemoteStreamInfo> {
        self.remote_stream.read().await.clone()
    }

    /// Last-known remote audio track, if still alive
    pub async fn remote_audio_track(&self) -> Option<Arc<TrackRemote>> {
        self.remote_audio_track.read().await.upgrade()
    }

    /// Last-known remote video track, if still alive
    pub async fn remote_video_track(&self) -> Option<Arc<TrackRemote>> {
        self.remote_video_track.read().await.upgrade()
    }

    /// Close the connection. Closing an already-closed connection is a
    /// no-op.
    pub async fn close(&self) -> Result<()> {
        if self.connection.connection_state() == RTCPeerConnectionState::Closed {
            return Ok(());
        }

        info!("Closing peer connection for {}", self.peer_id);

        self.connection.close().await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to close connection: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{LocalMediaSource, StaticMediaSource};

    #[tokio::test]
    async fn test_new_record_is_stable() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();

        assert_eq!(record.peer_id(), "peer-a");
        assert_eq!(record.signaling_state(), SignalingState::Stable);
        assert!(record.remote_stream().await.is_none());
        assert!(!record.has_local_description().await);
    }

    #[tokio::test]
    async fn test_create_offer_transitions_state() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();

        let offer = record.create_offer().await.unwrap();
        assert!(!offer.sdp.is_empty());
        assert_eq!(record.signaling_state(), SignalingState::HaveLocalOffer);
        assert!(record.has_local_description().await);
    }

    #[tokio::test]
    async fn test_second_offer_rejected_while_first_in_flight() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();

        record.create_offer().await.unwrap();

        let err = record.create_offer().await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignalingState(_)));
    }

    #[tokio::test]
    async fn test_answer_rejected_without_local_offer() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();

        // A fresh connection is stable: the shared table rejects the answer
        // before the engine is ever asked to apply it.
        let answer = RTCSessionDescription::answer("v=0\r\n".to_string())
            .unwrap_or_else(|_| RTCSessionDescription::default());
        let err = record.apply_remote_answer(answer).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignalingState(_)));
        assert_eq!(record.signaling_state(), SignalingState::Stable);
    }

    #[tokio::test]
    async fn test_attach_local_tracks_skips_existing_senders() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();
        let media = StaticMediaSource.acquire().await.unwrap();

        record.attach_local_tracks(&media).await.unwrap();
        let first = record.connection().get_senders().await.len();
        assert_eq!(first, media.tracks().len());

        // A second pass must not duplicate senders.
        record.attach_local_tracks(&media).await.unwrap();
        assert_eq!(record.connection().get_senders().await.len(), first);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let record = PeerRecord::new("peer-a".to_string(), &RoomConfig::default())
            .await
            .unwrap();

        record.close().await.unwrap();
        record.close().await.unwrap();
        assert_eq!(record.signaling_state(), SignalingState::Closed);
    }
}
