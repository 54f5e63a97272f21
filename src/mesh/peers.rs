// Local peer table — this session's derived view of the mesh.
//
// Rebuilt from the shared registry every discovery tick; never persisted.
// Staleness of the view is bounded by the discovery interval.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::registry::SessionMap;

/// One remote session as seen from here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub session_id: Uuid,
    pub port: u16,
    pub base_addr: String,
    /// `lastSeen` of the peer's registry record at our last reconcile.
    pub last_heartbeat_seen: DateTime<Utc>,
    /// False once the peer's record has gone stale but not yet been evicted.
    pub connected: bool,
}

/// Outcome of one reconcile pass, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub refreshed: usize,
    pub removed: usize,
}

/// Thread-safe peer table shared between the discovery loop, the broadcast
/// router, and the control-plane handlers.
#[derive(Clone, Default)]
pub struct PeerTable {
    peers: Arc<RwLock<HashMap<Uuid, PeerRecord>>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile against a registry snapshot: add unseen ids, refresh known
    /// ones, drop ids no longer present. The local session is excluded.
    pub async fn reconcile(
        &self,
        snapshot: &SessionMap,
        local_id: Uuid,
        staleness: chrono::Duration,
    ) -> ReconcileSummary {
        let now = Utc::now();
        let mut peers = self.peers.write().await;
        let mut summary = ReconcileSummary::default();

        for (id, record) in snapshot {
            if *id == local_id {
                continue;
            }
            let connected = !record.is_stale(now, staleness);
            match peers.get_mut(id) {
                Some(peer) => {
                    peer.port = record.port;
                    peer.base_addr = base_addr(record.port);
                    peer.last_heartbeat_seen = record.last_seen;
                    peer.connected = connected;
                    summary.refreshed += 1;
                }
                None => {
                    peers.insert(
                        *id,
                        PeerRecord {
                            session_id: *id,
                            port: record.port,
                            base_addr: base_addr(record.port),
                            last_heartbeat_seen: record.last_seen,
                            connected,
                        },
                    );
                    summary.added += 1;
                }
            }
        }

        let before = peers.len();
        peers.retain(|id, _| snapshot.contains_key(id) && *id != local_id);
        summary.removed = before - peers.len();

        summary
    }

    pub async fn list(&self) -> Vec<PeerRecord> {
        let peers = self.peers.read().await;
        let mut list: Vec<PeerRecord> = peers.values().cloned().collect();
        list.sort_by_key(|p| p.port);
        list
    }

    /// Peers eligible for broadcast delivery.
    pub async fn connected(&self) -> Vec<PeerRecord> {
        let peers = self.peers.read().await;
        let mut list: Vec<PeerRecord> = peers.values().filter(|p| p.connected).cloned().collect();
        list.sort_by_key(|p| p.port);
        list
    }

    pub async fn connected_ids(&self) -> Vec<Uuid> {
        self.connected().await.into_iter().map(|p| p.session_id).collect()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.peers.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}

fn base_addr(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRecord;

    fn record(id: Uuid, port: u16, last_seen: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id,
            process_id: 1,
            workspace_ref: None,
            window_ref: 0,
            capabilities: vec![],
            last_seen,
            port,
            peers: vec![],
        }
    }

    fn threshold() -> chrono::Duration {
        chrono::Duration::seconds(60)
    }

    #[tokio::test]
    async fn test_reconcile_adds_refreshes_removes() {
        let table = PeerTable::new();
        let local = Uuid::new_v4();
        let peer_a = Uuid::new_v4();
        let peer_b = Uuid::new_v4();

        let mut snapshot = SessionMap::new();
        snapshot.insert(local, record(local, 3637, Utc::now()));
        snapshot.insert(peer_a, record(peer_a, 3638, Utc::now()));
        snapshot.insert(peer_b, record(peer_b, 3639, Utc::now()));

        let summary = table.reconcile(&snapshot, local, threshold()).await;
        assert_eq!(summary.added, 2);
        assert_eq!(table.len().await, 2, "local session must be excluded");

        // Second pass refreshes; dropping peer_b from the snapshot removes it.
        snapshot.remove(&peer_b);
        let summary = table.reconcile(&snapshot, local, threshold()).await;
        assert_eq!(summary.added, 0);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.removed, 1);

        let list = table.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].session_id, peer_a);
        assert_eq!(list[0].base_addr, "http://127.0.0.1:3638");
    }

    #[tokio::test]
    async fn test_stale_peer_marked_disconnected() {
        let table = PeerTable::new();
        let local = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let stale = Uuid::new_v4();

        let mut snapshot = SessionMap::new();
        snapshot.insert(fresh, record(fresh, 3640, Utc::now()));
        snapshot.insert(
            stale,
            record(stale, 3641, Utc::now() - chrono::Duration::seconds(120)),
        );

        table.reconcile(&snapshot, local, threshold()).await;

        assert_eq!(table.len().await, 2);
        let connected = table.connected().await;
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].session_id, fresh);
        assert_eq!(table.connected_ids().await, vec![fresh]);
    }

    #[tokio::test]
    async fn test_port_change_refreshes_base_addr() {
        let table = PeerTable::new();
        let local = Uuid::new_v4();
        let peer = Uuid::new_v4();

        let mut snapshot = SessionMap::new();
        snapshot.insert(peer, record(peer, 3650, Utc::now()));
        table.reconcile(&snapshot, local, threshold()).await;

        // Peer restarted on a different port under the same id.
        snapshot.insert(peer, record(peer, 3651, Utc::now()));
        table.reconcile(&snapshot, local, threshold()).await;

        let list = table.list().await;
        assert_eq!(list[0].port, 3651);
        assert_eq!(list[0].base_addr, "http://127.0.0.1:3651");
    }
}
