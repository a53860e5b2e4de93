//! Inbound signaling handlers: the protocol state machine
//!
//! Messages can arrive for peers not yet registered, more than once, and
//! out of the happy-path order; the transport guarantees nothing across
//! peers. Every transition is therefore guarded by the shared
//! [`SignalingState`] table before the engine is asked to do anything, and
//! every failure is absorbed into observable state at this boundary.

use crate::media::RemoteStreamInfo;
use crate::peer::{NegotiationOp, PeerRecord};
use crate::session::controller::SessionInner;
use crate::session::state::SessionEvent;
use crate::signaling::events::{
    self, AnswerFrom, CandidateFrom, ForwardedCandidate, ForwardedDescription, OfferFrom,
    RoomMember, UserLeft,
};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_remote::TrackRemote;

impl SessionInner {
    // ---- payload dispatch ------------------------------------------------

    pub(crate) async fn dispatch_user_joined(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<RoomMember>(payload) {
            Ok(member) => self.initiate_offer_for(member).await,
            Err(e) => warn!("Malformed user_joined payload: {}", e),
        }
    }

    pub(crate) async fn dispatch_existing_users(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<Vec<RoomMember>>(payload) {
            Ok(members) => {
                for member in members {
                    self.initiate_offer_for(member).await;
                }
            }
            Err(e) => warn!("Malformed existing_users_in_room payload: {}", e),
        }
    }

    pub(crate) async fn dispatch_receive_offer(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<OfferFrom>(payload) {
            Ok(msg) => self.handle_offer(msg).await,
            Err(e) => warn!("Malformed receive_offer payload: {}", e),
        }
    }

    pub(crate) async fn dispatch_receive_answer(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<AnswerFrom>(payload) {
            Ok(msg) => self.handle_answer(msg).await,
            Err(e) => warn!("Malformed receive_answer payload: {}", e),
        }
    }

    pub(crate) async fn dispatch_receive_candidate(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<CandidateFrom>(payload) {
            Ok(msg) => self.handle_candidate(msg).await,
            Err(e) => warn!("Malformed receive_candidate payload: {}", e),
        }
    }

    pub(crate) async fn dispatch_user_left(self: &Arc<Self>, payload: Value) {
        match serde_json::from_value::<UserLeft>(payload) {
            Ok(msg) => self.remove_peer(&msg.socket_id).await,
            Err(e) => warn!("Malformed user_left payload: {}", e),
        }
    }

    // ---- caller role -----------------------------------------------------

    /// `user_joined` / one entry of `existing_users_in_room`: we call.
    pub(crate) async fn initiate_offer_for(self: &Arc<Self>, member: RoomMember) {
        let peer_id = member.socket_id;

        if self.is_self_id(&peer_id).await {
            debug!("Ignoring our own join echo");
            return;
        }
        if let Some(user_id) = &member.user_id {
            if self.is_self_id(user_id).await {
                debug!("Ignoring our own join echo");
                return;
            }
        }

        let (record, created) = match self.ensure_peer(&peer_id).await {
            Ok(pair) => pair,
            Err(e) => {
                self.record_error(Some(&peer_id), e.to_string()).await;
                return;
            }
        };

        // An exchange already underway means this join event is a
        // duplicate; a second offer now would be rejected by the engine, so
        // it is never attempted.
        if !created && !record.signaling_state().permits(NegotiationOp::SendOffer) {
            debug!(
                "Offer exchange already underway for peer {} ({}), skipping",
                peer_id,
                record.signaling_state()
            );
            return;
        }

        let offer = match record.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                // The record stays: offer creation fails in `stable`, so a
                // later join retry can attempt again.
                self.record_error(Some(&peer_id), e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self
            .send_description(events::SEND_OFFER, &peer_id, offer)
            .await
        {
            self.record_error(Some(&peer_id), e.to_string()).await;
        }
    }

    // ---- callee role -----------------------------------------------------

    /// `receive_offer`: they call, we answer.
    pub(crate) async fn handle_offer(self: &Arc<Self>, msg: OfferFrom) {
        let peer_id = msg.sender_socket_id;

        if self.is_self_id(&peer_id).await {
            return;
        }

        let (record, _created) = match self.ensure_peer(&peer_id).await {
            Ok(pair) => pair,
            Err(e) => {
                self.record_error(Some(&peer_id), e.to_string()).await;
                return;
            }
        };

        if let Err(e) = record.apply_remote_offer(msg.offer).await {
            self.record_error(Some(&peer_id), e.to_string()).await;
            return;
        }

        // The offer must have left the connection owing an answer.
        let state = record.signaling_state();
        if !state.ready_to_answer() {
            self.record_error(
                Some(&peer_id),
                format!("offer applied but connection is {}, not answering", state),
            )
            .await;
            return;
        }

        let answer = match record.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.record_error(Some(&peer_id), e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self
            .send_description(events::SEND_ANSWER, &peer_id, answer)
            .await
        {
            self.record_error(Some(&peer_id), e.to_string()).await;
        }
    }

    /// `receive_answer`: completes a negotiation we initiated.
    pub(crate) async fn handle_answer(&self, msg: AnswerFrom) {
        let peer_id = msg.sender_socket_id;

        if self.is_self_id(&peer_id).await {
            return;
        }
        let Some(record) = self.registry.get(&peer_id).await else {
            debug!("Answer from unregistered peer {} ignored", peer_id);
            return;
        };

        // An answer while stable means the negotiation already completed or
        // never started: a stale or duplicate delivery, dropped without
        // ever reaching the engine.
        let state = record.signaling_state();
        if !state.permits(NegotiationOp::ApplyRemoteAnswer) {
            debug!("Dropping answer from peer {} in state {}", peer_id, state);
            return;
        }

        if !record.has_local_description().await {
            self.record_error(
                Some(&peer_id),
                "answer received but no offer was sent".to_string(),
            )
            .await;
            return;
        }

        if let Err(e) = record.apply_remote_answer(msg.answer).await {
            self.record_error(Some(&peer_id), e.to_string()).await;
        }
    }

    /// `receive_candidate`: trickle ICE from a remote peer.
    pub(crate) async fn handle_candidate(&self, msg: CandidateFrom) {
        let peer_id = msg.sender_socket_id;

        if self.is_self_id(&peer_id).await {
            return;
        }
        let Some(record) = self.registry.get(&peer_id).await else {
            debug!("Candidate from unregistered peer {} ignored", peer_id);
            return;
        };

        if let Err(e) = record.add_remote_candidate(msg.candidate).await {
            // Candidates may legitimately race ahead of the SDP; the engine
            // keeps gathering, so losing one is non-fatal.
            self.record_error(Some(&peer_id), e.to_string()).await;
        }
    }

    // ---- registry mutation ----------------------------------------------

    /// Get or create the record for `peer_id`, wiring the connection
    /// observers and attaching the current local tracks on creation.
    pub(crate) async fn ensure_peer(
        self: &Arc<Self>,
        peer_id: &str,
    ) -> Result<(Arc<PeerRecord>, bool)> {
        let (record, created) = self
            .registry
            .upsert(peer_id, || async move {
                let record =
                    Arc::new(PeerRecord::new(peer_id.to_string(), &self.config).await?);
                self.wire_connection_observers(&record);

                let media = self.state.read().await.local_media.clone();
                if let Some(media) = media {
                    record.attach_local_tracks(&media).await?;
                }

                Ok(record)
            })
            .await?;

        if created {
            let _ = self.events.send(SessionEvent::PeerAdded {
                peer_id: peer_id.to_string(),
            });
        }

        Ok((record, created))
    }

    /// Remove a peer: close + delete the record and prune the remote-stream
    /// projection. Idempotent; shared by `user_left`, the connection-state
    /// observer, and nothing else.
    pub(crate) async fn remove_peer(&self, peer_id: &str) {
        let removed = self.registry.remove(peer_id).await;
        let pruned = self
            .state
            .write()
            .await
            .remote_streams
            .remove(peer_id)
            .is_some();

        if removed || pruned {
            let _ = self.events.send(SessionEvent::PeerRemoved {
                peer_id: peer_id.to_string(),
            });
        }
    }

    // ---- connection observers -------------------------------------------

    /// Wire the per-connection callbacks: trickle ICE out, remote tracks
    /// into the projection, and the self-healing state observer. Only weak
    /// references are captured.
    pub(crate) fn wire_connection_observers(self: &Arc<Self>, record: &PeerRecord) {
        let connection = record.connection();
        let peer_id = record.peer_id().to_string();

        let weak = Arc::downgrade(self);
        let id = peer_id.clone();
        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let weak = weak.clone();
            let peer_id = id.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let Some(inner) = weak.upgrade() else { return };
                inner.forward_local_candidate(&peer_id, candidate).await;
            })
        }));

        let weak = Arc::downgrade(self);
        let id = peer_id.clone();
        connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let weak = weak.clone();
            let peer_id = id.clone();
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else { return };
                inner.note_remote_track(&peer_id, track).await;
            })
        }));

        // Self-healing: silent network failures never arrive over the
        // signaling channel, so a dying connection removes its own record.
        let weak = Arc::downgrade(self);
        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let weak = weak.clone();
                let peer_id = peer_id.clone();
                Box::pin(async move {
                    if !matches!(
                        state,
                        RTCPeerConnectionState::Disconnected
                            | RTCPeerConnectionState::Failed
                            | RTCPeerConnectionState::Closed
                    ) {
                        return;
                    }
                    let Some(inner) = weak.upgrade() else { return };
                    debug!("Connection for peer {} reported {}, removing", peer_id, state);
                    // Removal runs off the engine's delivery path.
                    tokio::spawn(async move {
                        inner.remove_peer(&peer_id).await;
                    });
                })
            },
        ));
    }

    async fn forward_local_candidate(&self, peer_id: &str, candidate: RTCIceCandidate) {
        let init = match candidate.to_json() {
            Ok(init) => init,
            Err(e) => {
                warn!("Failed to serialize ICE candidate for {}: {}", peer_id, e);
                return;
            }
        };

        let Some(room_id) = self.state.read().await.room_id.clone() else {
            return;
        };

        let msg = ForwardedCandidate {
            room_id,
            target_user_id: peer_id.to_string(),
            payload: init,
        };

        match serde_json::to_value(&msg) {
            Ok(payload) => {
                if let Err(e) = self.transport.emit(events::SEND_CANDIDATE, payload).await {
                    warn!("Failed to send candidate to {}: {}", peer_id, e);
                }
            }
            Err(e) => warn!("Failed to encode candidate for {}: {}", peer_id, e),
        }
    }

    async fn note_remote_track(&self, peer_id: &str, track: Arc<TrackRemote>) {
        let Some(record) = self.registry.get(peer_id).await else {
            debug!("Track from unregistered peer {} ignored", peer_id);
            return;
        };

        let info: RemoteStreamInfo = record.note_remote_track(&track).await;
        debug!("Remote {} track from peer {}", track.kind(), peer_id);

        self.state
            .write()
            .await
            .remote_streams
            .insert(peer_id.to_string(), info.clone());
        let _ = self.events.send(SessionEvent::RemoteStreamUpdated(info));
    }

    // ---- outbound helpers -----------------------------------------------

    async fn send_description(
        &self,
        event: &str,
        target: &str,
        description: RTCSessionDescription,
    ) -> Result<()> {
        let Some(room_id) = self.state.read().await.room_id.clone() else {
            return Err(Error::SignalingError("not joined to a room".to_string()));
        };

        let msg = ForwardedDescription {
            room_id,
            target_user_id: target.to_string(),
            payload: description,
        };
        let payload =
            serde_json::to_value(&msg).map_err(|e| Error::SerializationError(e.to_string()))?;

        self.transport.emit(event, payload).await
    }
}
