// Peer discovery engine
//
// Periodically reconciles the shared registry into the local peer table.
// Runs on its own interval, independent of the heartbeat: heartbeats write
// our record, discovery reads everyone else's.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::peers::{PeerTable, ReconcileSummary};
use crate::registry::RegistryStore;

pub struct DiscoveryEngine {
    store: Arc<dyn RegistryStore>,
    peers: PeerTable,
    local_id: Uuid,
    interval: Duration,
    staleness: chrono::Duration,
}

impl DiscoveryEngine {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        peers: PeerTable,
        local_id: Uuid,
        interval: Duration,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            store,
            peers,
            local_id,
            interval,
            staleness,
        }
    }

    /// One reconciliation pass. Registry trouble degrades to an empty
    /// snapshot inside the store, so this never fails.
    pub async fn tick(&self) -> ReconcileSummary {
        let snapshot = self.store.read();
        let summary = self
            .peers
            .reconcile(&snapshot, self.local_id, self.staleness)
            .await;
        if summary.added > 0 || summary.removed > 0 {
            let peer_count = self.peers.len().await;
            tracing::info!(
                added = summary.added,
                removed = summary.removed,
                peers = peer_count,
                "Peer table updated"
            );
        }
        summary
    }

    /// Spawn the discovery loop. Ticks immediately, then every interval.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FileRegistryStore, SessionMap};
    use crate::session::SessionRecord;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(port: u16) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            process_id: 1,
            workspace_ref: None,
            window_ref: 0,
            capabilities: vec![],
            last_seen: Utc::now(),
            port,
            peers: vec![],
        }
    }

    #[tokio::test]
    async fn test_tick_reconciles_from_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileRegistryStore::new(dir.path().join("registry.json")));
        let peers = PeerTable::new();
        let local = record(3637);
        let remote = record(3638);

        let mut sessions = SessionMap::new();
        sessions.insert(local.id, local.clone());
        sessions.insert(remote.id, remote.clone());
        crate::registry::RegistryStore::write(store.as_ref(), &sessions).unwrap();

        let engine = DiscoveryEngine::new(
            store,
            peers.clone(),
            local.id,
            Duration::from_secs(10),
            chrono::Duration::seconds(60),
        );

        let summary = engine.tick().await;
        assert_eq!(summary.added, 1);
        assert_eq!(peers.connected_ids().await, vec![remote.id]);
    }

    #[tokio::test]
    async fn test_tick_with_missing_store_is_empty_view() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileRegistryStore::new(dir.path().join("absent.json")));
        let peers = PeerTable::new();

        let engine = DiscoveryEngine::new(
            store,
            peers.clone(),
            Uuid::new_v4(),
            Duration::from_secs(10),
            chrono::Duration::seconds(60),
        );

        let summary = engine.tick().await;
        assert_eq!(summary, ReconcileSummary::default());
        assert!(peers.is_empty().await);
    }
}
