//! In-crate test support: a recording in-memory transport and SDP helpers

#![allow(dead_code)]

use crate::config::RoomConfig;
use crate::media::{LocalMediaSource, StaticMediaSource};
use crate::peer::PeerRecord;
use crate::session::controller::SessionInner;
use crate::signaling::{EventHandler, SignalingTransport};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// In-memory signaling transport that records every emit and lets tests
/// deliver inbound events by hand.
pub(crate) struct RecordingTransport {
    connected: AtomicBool,
    fail_next_connect: AtomicBool,
    handlers: Mutex<HashMap<String, EventHandler>>,
    sent: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            fail_next_connect: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `connect` fail, simulating an auth rejection
    pub(crate) fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Deliver an inbound event to the registered handler, awaiting the
    /// handler to completion (the transport's FIFO contract)
    pub(crate) async fn deliver(&self, event: &str, payload: Value) {
        let future = {
            let handlers = self.handlers.lock().await;
            handlers.get(event).map(|handler| handler(payload))
        };
        if let Some(future) = future {
            future.await;
        }
    }

    /// Payloads emitted under `event`, in order
    pub(crate) async fn sent_of(&self, event: &str) -> Vec<Value> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Whether a handler is currently registered for `event`
    pub(crate) async fn has_handler(&self, event: &str) -> bool {
        self.handlers.lock().await.contains_key(event)
    }
}

#[async_trait]
impl SignalingTransport for RecordingTransport {
    async fn connect(&self, _token: &str) -> Result<()> {
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(Error::SignalingError("authentication rejected".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::SignalingError("transport not connected".to_string()));
        }
        self.sent.lock().await.push((event.to_string(), payload));
        Ok(())
    }

    async fn on(&self, event: &str, handler: EventHandler) {
        self.handlers.lock().await.insert(event.to_string(), handler);
    }

    async fn off(&self, event: &str) {
        self.handlers.lock().await.remove(event);
    }
}

/// A session core with identity and local media in place, as if `connect`
/// had completed, plus its transport
pub(crate) async fn connected_inner(
    room_id: &str,
    user_id: &str,
) -> (Arc<SessionInner>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    transport.connect("token").await.unwrap();

    let inner = SessionInner::new(
        RoomConfig::default(),
        transport.clone(),
        Arc::new(StaticMediaSource),
    );

    let media = Arc::new(StaticMediaSource.acquire().await.unwrap());
    {
        let mut state = inner.state.write().await;
        state.room_id = Some(room_id.to_string());
        state.user_id = Some(user_id.to_string());
        state.local_media = Some(media);
    }

    (inner, transport)
}

/// A real offer from a throwaway peer with audio and video tracks
pub(crate) async fn offer_from_fresh_peer() -> RTCSessionDescription {
    let record = PeerRecord::new("throwaway".to_string(), &RoomConfig::default())
        .await
        .unwrap();
    let media = StaticMediaSource.acquire().await.unwrap();
    record.attach_local_tracks(&media).await.unwrap();
    record.create_offer().await.unwrap()
}
