//! Shared harness: an in-memory signaling bus and offline SDP helpers

#![allow(dead_code)]

use async_trait::async_trait;
use roomlink_webrtc::{
    Error, EventHandler, LocalMediaSource, PeerRecord, Result, RoomConfig, RoomSession,
    SignalingTransport, StaticMediaSource,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// In-memory signaling transport: records every emitted event and lets a
/// test deliver inbound events by hand, awaiting the handler to completion
/// as a FIFO transport would.
pub struct MemorySignaling {
    connected: AtomicBool,
    handlers: Mutex<HashMap<String, EventHandler>>,
    sent: Mutex<Vec<(String, Value)>>,
}

impl MemorySignaling {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Deliver an inbound event to the registered handler
    pub async fn deliver(&self, event: &str, payload: Value) {
        let future = {
            let handlers = self.handlers.lock().await;
            handlers.get(event).map(|handler| handler(payload))
        };
        if let Some(future) = future {
            future.await;
        }
    }

    /// Every payload emitted under `event`, in order
    pub async fn sent_of(&self, event: &str) -> Vec<Value> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Whether a handler is registered for `event`
    pub async fn has_handler(&self, event: &str) -> bool {
        self.handlers.lock().await.contains_key(event)
    }
}

#[async_trait]
impl SignalingTransport for MemorySignaling {
    async fn connect(&self, _token: &str) -> Result<()> {
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

/// Initialize test logging once; `RUST_LOG` selects the verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A session connected to `room_id` as `user_id`, plus its bus
pub async fn connected_session(room_id: &str, user_id: &str) -> (RoomSession, Arc<MemorySignaling>) {
    init_tracing();
    let transport = Arc::new(MemorySignaling::new());
    let session =
        RoomSession::with_default_media(RoomConfig::default(), transport.clone()).unwrap();
    session.connect(room_id, "token", user_id).await.unwrap();
    (session, transport)
}

/// A real offer from a throwaway peer carrying audio and video tracks
pub async fn media_offer() -> RTCSessionDescription {
    let record = PeerRecord::new("remote".to_string(), &RoomConfig::default())
        .await
        .unwrap();
    let media = StaticMediaSource.acquire().await.unwrap();
    record.attach_local_tracks(&media).await.unwrap();
    record.create_offer().await.unwrap()
}

/// Answer `offer` from a throwaway remote engine, as the far side of the
/// wire would
pub async fn answer_for(offer: &RTCSessionDescription) -> RTCSessionDescription {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().unwrap();
    let registry = register_default_interceptors(Default::default(), &mut media_engine).unwrap();
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap();

    pc.set_remote_description(offer.clone()).await.unwrap();
    let answer = pc.create_answer(None).await.unwrap();
    pc.set_local_description(answer).await.unwrap();
    let desc = pc.local_description().await.unwrap();
    let _ = pc.close().await;
    desc
}
