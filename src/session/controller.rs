//! The room session controller
//!
//! One `RoomSession` owns the registry, the local media, and the handler
//! registrations for exactly one signaling channel. Both of its external
//! dependencies (the signaling transport and local media acquisition) are
//! injected, so the same core serves any UI binding.

use crate::config::RoomConfig;
use crate::media::{LocalMedia, LocalMediaSource, MediaKind, StaticMediaSource};
use crate::peer::{PeerRecord, PeerRegistry, SignalingState};
use crate::session::state::{AttributedError, SessionEvent, SessionSnapshot, SessionState};
use crate::signaling::events;
use crate::signaling::{JoinRoom, SignalingTransport};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Shared core behind a [`RoomSession`] and the callbacks it registers
pub(crate) struct SessionInner {
    /// ICE and mesh configuration
    pub(crate) config: RoomConfig,

    /// Injected signaling channel (exactly one per session)
    pub(crate) transport: Arc<dyn SignalingTransport>,

    /// Injected local media acquisition
    pub(crate) media_source: Arc<dyn LocalMediaSource>,

    /// Peer id to connection record
    pub(crate) registry: PeerRegistry,

    /// Observable session state
    pub(crate) state: RwLock<SessionState>,

    /// Event stream for observers
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl SessionInner {
    pub(crate) fn new(
        config: RoomConfig,
        transport: Arc<dyn SignalingTransport>,
        media_source: Arc<dyn LocalMediaSource>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_buffer);
        let registry = PeerRegistry::new(config.max_peers);

        Arc::new(Self {
            config,
            transport,
            media_source,
            registry,
            state: RwLock::new(SessionState::new()),
            events,
        })
    }

    pub(crate) async fn set_loading(&self, loading: bool) {
        self.state.write().await.is_loading = loading;
    }

    /// Whether `id` is our own identity (self-message filter)
    pub(crate) async fn is_self_id(&self, id: &str) -> bool {
        self.state.read().await.user_id.as_deref() == Some(id)
    }

    /// Record a non-fatal attributed error and notify observers
    pub(crate) async fn record_error(&self, peer_id: Option<&str>, message: String) {
        match peer_id {
            Some(peer) => warn!("Peer {} error: {}", peer, message),
            None => warn!("Session error: {}", message),
        }

        let error = AttributedError {
            peer_id: peer_id.map(str::to_string),
            message,
        };
        self.state.write().await.last_error = Some(error.clone());
        let _ = self.events.send(SessionEvent::PeerError {
            peer_id: error.peer_id,
            message: error.message,
        });
    }

    /// Register the six inbound handlers on the transport.
    ///
    /// Each handler holds only a weak reference to the session, parses the
    /// payload, and hands off to the matching transition; every failure is
    /// absorbed into state before the handler returns.
    pub(crate) async fn register_handlers(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::USER_JOINED,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_user_joined(payload).await;
                        }
                    })
                }),
            )
            .await;

        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::EXISTING_USERS_IN_ROOM,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_existing_users(payload).await;
                        }
                    })
                }),
            )
            .await;

        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::RECEIVE_OFFER,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_receive_offer(payload).await;
                        }
                    })
                }),
            )
            .await;

        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::RECEIVE_ANSWER,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_receive_answer(payload).await;
                        }
                    })
                }),
            )
            .await;

        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::RECEIVE_CANDIDATE,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_receive_candidate(payload).await;
                        }
                    })
                }),
            )
            .await;

        let weak = Arc::downgrade(self);
        self.transport
            .on(
                events::USER_LEFT,
                Box::new(move |payload| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.dispatch_user_left(payload).await;
                        }
                    })
                }),
            )
            .await;
    }

    /// Tear the whole session down. The order matters: connections close
    /// before local tracks stop, so no sender races a stopping track.
    pub(crate) async fn teardown(&self) {
        self.registry.clear().await;

        let (media, was_active) = {
            let mut state = self.state.write().await;
            let was_active = state.room_id.is_some();
            state.room_id = None;
            state.user_id = None;
            state.is_loading = false;
            state.remote_streams.clear();
            (state.local_media.take(), was_active)
        };

        if let Some(media) = media {
            media.stop();
        }

        for event in events::INBOUND_EVENTS {
            self.transport.off(event).await;
        }

        if self.transport.is_connected() {
            if let Err(e) = self.transport.disconnect().await {
                warn!("Error disconnecting signaling transport: {}", e);
            }
        }

        if was_active {
            let _ = self.events.send(SessionEvent::Disconnected);
        }
    }
}

/// Public surface of the signaling and connection-lifecycle core
///
/// Cheap to clone through `Arc`; all methods take `&self`.
pub struct RoomSession {
    inner: Arc<SessionInner>,
}

impl RoomSession {
    /// Create a session with injected transport and media source
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: RoomConfig,
        transport: Arc<dyn SignalingTransport>,
        media_source: Arc<dyn LocalMediaSource>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: SessionInner::new(config, transport, media_source),
        })
    }

    /// Create a session using [`StaticMediaSource`] for local media
    pub fn with_default_media(
        config: RoomConfig,
        transport: Arc<dyn SignalingTransport>,
    ) -> Result<Self> {
        Self::new(config, transport, Arc::new(StaticMediaSource))
    }

    /// Join a room.
    ///
    /// Ensures the signaling channel is up (reusing it if already
    /// connected), acquires local media with the current mute flags
    /// applied, registers the signaling handlers, and announces membership.
    /// Joining the room the session is already in is a no-op; joining a
    /// different room tears the current session down first.
    ///
    /// # Errors
    ///
    /// Transport and media failures are returned to the caller after a full
    /// cleanup; partial setup is never left running.
    pub async fn connect(&self, room_id: &str, token: &str, user_id: &str) -> Result<()> {
        if user_id.is_empty() {
            let err = Error::InvalidConfig("a user id is required to join a room".to_string());
            self.inner.record_error(None, err.to_string()).await;
            return Err(err);
        }

        {
            let state = self.inner.state.read().await;
            if state.room_id.as_deref() == Some(room_id) && self.inner.transport.is_connected() {
                debug!("Already connected to room {}, ignoring connect", room_id);
                return Ok(());
            }
        }

        if self.inner.state.read().await.room_id.is_some() {
            self.inner.teardown().await;
        }

        info!("Connecting to room {} as {}", room_id, user_id);
        self.inner.set_loading(true).await;

        let setup = self.setup(room_id, token, user_id).await;
        self.inner.set_loading(false).await;

        if let Err(e) = setup {
            warn!("Connect to room {} failed: {}", room_id, e);
            self.inner.teardown().await;
            self.inner.record_error(None, e.to_string()).await;
            return Err(e);
        }

        let _ = self.inner.events.send(SessionEvent::Connected {
            room_id: room_id.to_string(),
        });

        Ok(())
    }

    async fn setup(&self, room_id: &str, token: &str, user_id: &str) -> Result<()> {
        let inner = &self.inner;

        if !inner.transport.is_connected() {
            inner.transport.connect(token).await?;
        }

        let media = Arc::new(inner.media_source.acquire().await?);

        {
            let mut state = inner.state.write().await;
            media.set_kind_enabled(MediaKind::Audio, !state.is_audio_muted);
            media.set_kind_enabled(MediaKind::Video, !state.is_video_muted);
            state.local_media = Some(Arc::clone(&media));
            state.room_id = Some(room_id.to_string());
            state.user_id = Some(user_id.to_string());
        }

        // Handlers go in before the announce: the membership snapshot can
        // come back on the very next delivery.
        inner.register_handlers().await;

        let join = JoinRoom {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        };
        let payload =
            serde_json::to_value(&join).map_err(|e| Error::SerializationError(e.to_string()))?;
        inner.transport.emit(events::JOIN_VIDEO_ROOM, payload).await?;

        Ok(())
    }

    /// Leave the room and release everything: close and clear the registry,
    /// stop local media, clear identity, deregister handlers, drop the
    /// signaling channel. Safe to call when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting session");
        self.inner.teardown().await;
        Ok(())
    }

    /// Flip local audio mute. Returns the resulting muted flag; a no-op
    /// without local media.
    pub async fn toggle_audio(&self) -> bool {
        self.toggle(MediaKind::Audio).await
    }

    /// Flip local video mute. Returns the resulting muted flag; a no-op
    /// without local media.
    pub async fn toggle_video(&self) -> bool {
        self.toggle(MediaKind::Video).await
    }

    async fn toggle(&self, kind: MediaKind) -> bool {
        let muted = {
            let mut state = self.inner.state.write().await;
            let Some(media) = state.local_media.clone() else {
                debug!("toggle_{} without local media is a no-op", kind);
                return match kind {
                    MediaKind::Audio => state.is_audio_muted,
                    MediaKind::Video => state.is_video_muted,
                };
            };

            let muted = match kind {
                MediaKind::Audio => {
                    state.is_audio_muted = !state.is_audio_muted;
                    state.is_audio_muted
                }
                MediaKind::Video => {
                    state.is_video_muted = !state.is_video_muted;
                    state.is_video_muted
                }
            };
            media.set_kind_enabled(kind, !muted);
            muted
        };

        let _ = self
            .inner
            .events
            .send(SessionEvent::MuteChanged { kind, muted });

        muted
    }

    /// Cloneable snapshot of the observable session state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read().await;
        SessionSnapshot {
            room_id: state.room_id.clone(),
            user_id: state.user_id.clone(),
            is_loading: state.is_loading,
            is_audio_muted: state.is_audio_muted,
            is_video_muted: state.is_video_muted,
            has_local_media: state.local_media.is_some(),
            last_error: state.last_error.clone(),
            remote_streams: state.remote_streams.values().cloned().collect(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the session is joined to a room over a live channel
    pub async fn is_connected(&self) -> bool {
        self.inner.transport.is_connected() && self.inner.state.read().await.room_id.is_some()
    }

    /// The local stream, for the host's sample pump
    pub async fn local_media(&self) -> Option<Arc<LocalMedia>> {
        self.inner.state.read().await.local_media.clone()
    }

    /// Number of registered peers
    pub async fn peer_count(&self) -> usize {
        self.inner.registry.len().await
    }

    /// Identities of all registered peers (unordered)
    pub async fn peer_ids(&self) -> Vec<String> {
        self.inner.registry.peer_ids().await
    }

    /// The record for a peer, if registered
    pub async fn peer(&self, peer_id: &str) -> Option<Arc<PeerRecord>> {
        self.inner.registry.get(peer_id).await
    }

    /// Signaling state of a peer's connection, if registered
    pub async fn peer_signaling_state(&self, peer_id: &str) -> Option<SignalingState> {
        self.inner
            .registry
            .get(peer_id)
            .await
            .map(|record| record.signaling_state())
    }
}
