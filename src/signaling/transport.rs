//! The injected signaling transport contract
//!
//! The session core never opens its own socket. The host application hands
//! it one connected (or connectable) channel per session; exactly one
//! channel is used for the session's lifetime.

use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

/// Callback invoked for each delivery of a subscribed event.
///
/// The transport must await the returned future before delivering the next
/// event on the same channel, preserving its FIFO ordering.
pub type EventHandler = Box<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Bidirectional signaling channel keyed by authentication token.
///
/// Implementations are expected to deliver events in arrival order and to
/// tolerate `emit` for events nobody listens to. No delivery or ordering
/// guarantee exists *across* peers; the session's handlers are written for
/// that.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Establish the channel. Reconnecting an already-connected transport
    /// must reuse the session, never open a duplicate.
    async fn connect(&self, token: &str) -> Result<()>;

    /// Tear the channel down. Safe to call when already disconnected.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the channel is currently established
    fn is_connected(&self) -> bool;

    /// Send a named event with a JSON payload
    async fn emit(&self, event: &str, payload: Value) -> Result<()>;

    /// Register the handler for a named event, replacing any previous one
    async fn on(&self, event: &str, handler: EventHandler);

    /// Deregister the handler for a named event
    async fn off(&self, event: &str);
}
