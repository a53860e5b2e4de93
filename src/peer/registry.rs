//! Connection registry: the single owner of peer records

use super::record::PeerRecord;
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Mapping from peer identity to its connection record.
///
/// All mutations are idempotent with respect to peer identity: `upsert`
/// returns the existing record rather than building a second connection,
/// and `remove` for an unknown peer is a no-op. Every teardown path
/// (`user_left`, the connection-state observer, `disconnect`) funnels
/// through `remove`/`clear`, so no connection handle is leaked or closed
/// twice.
pub struct PeerRegistry {
    /// Map of peer id to record
    peers: RwLock<HashMap<String, Arc<PeerRecord>>>,

    /// Maximum number of peers in the mesh
    max_peers: u32,
}

impl PeerRegistry {
    /// Create a registry with the given mesh cap (validated by
    /// [`RoomConfig::validate`](crate::RoomConfig::validate))
    pub fn new(max_peers: u32) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            max_peers,
        }
    }

    /// Return the record for `peer_id`, constructing one via `factory` if
    /// absent.
    ///
    /// The write lock is held across construction so two racing messages
    /// for the same new peer cannot each build a connection. Returns the
    /// record and whether it was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory fails or the mesh cap is reached.
    pub async fn upsert<F, Fut>(&self, peer_id: &str, factory: F) -> Result<(Arc<PeerRecord>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<PeerRecord>>>,
    {
        let mut peers = self.peers.write().await;

        if let Some(existing) = peers.get(peer_id) {
            return Ok((Arc::clone(existing), false));
        }

        if peers.len() >= self.max_peers as usize {
            return Err(Error::PeerConnectionError(format!(
                "Maximum peer limit reached ({})",
                self.max_peers
            )));
        }

        let record = factory().await?;
        info!("Registered peer {}", peer_id);
        peers.insert(peer_id.to_string(), Arc::clone(&record));

        Ok((record, true))
    }

    /// Close and delete the record for `peer_id`.
    ///
    /// The entry is taken out of the map before the connection is closed,
    /// so a re-entrant removal (the connection-state observer firing during
    /// `close`) finds no entry and returns without touching anything.
    /// Returns whether an entry was removed.
    pub async fn remove(&self, peer_id: &str) -> bool {
        let record = self.peers.write().await.remove(peer_id);

        match record {
            Some(record) => {
                info!("Removing peer {}", peer_id);
                if let Err(e) = record.close().await {
                    warn!("Error closing connection for peer {}: {}", peer_id, e);
                }
                true
            }
            None => {
                debug!("Remove for unknown peer {} ignored", peer_id);
                false
            }
        }
    }

    /// Close and delete every record; used only by `disconnect()`
    pub async fn clear(&self) {
        let drained: Vec<(String, Arc<PeerRecord>)> =
            self.peers.write().await.drain().collect();

        for (peer_id, record) in drained {
            debug!("Closing connection for peer {}", peer_id);
            if let Err(e) = record.close().await {
                warn!("Error closing peer {}: {}", peer_id, e);
            }
        }
    }

    /// Get the record for a peer, if registered
    pub async fn get(&self, peer_id: &str) -> Option<Arc<PeerRecord>> {
        self.peers.read().await.get(peer_id).cloned()
    }

    /// Whether a peer is registered
    pub async fn contains(&self, peer_id: &str) -> bool {
        self.peers.read().await.contains_key(peer_id)
    }

    /// Number of registered peers
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Identities of all registered peers (unordered)
    pub async fn peer_ids(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }
}
