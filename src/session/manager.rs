// Session lifecycle: register, heartbeat, cooperative cleanup, deregister.
//
// State machine: Created -> Running -> Stopping -> Terminated. `start` is
// not re-entrant; `stop` always reaches Terminated even when individual
// teardown steps fail (those are logged and absorbed — a failed
// deregistration write just leaves a record for someone's cleanup pass).

use chrono::Utc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::identity::SessionIdentity;
use super::record::SessionRecord;
use crate::config::MeshConfig;
use crate::error::{MeshError, MeshResult};
use crate::mesh::PeerTable;
use crate::registry::RegistryStore;
use crate::server::DynamicEndpointRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Stopping,
    Terminated,
}

pub struct SessionManager {
    identity: SessionIdentity,
    capabilities: Vec<String>,
    store: Arc<dyn RegistryStore>,
    endpoints: Arc<DynamicEndpointRegistry>,
    peers: PeerTable,
    mesh: MeshConfig,
    state: RwLock<SessionState>,
    record: RwLock<Option<SessionRecord>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        identity: SessionIdentity,
        capabilities: Vec<String>,
        store: Arc<dyn RegistryStore>,
        endpoints: Arc<DynamicEndpointRegistry>,
        peers: PeerTable,
        mesh: MeshConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            capabilities,
            store,
            endpoints,
            peers,
            mesh,
            state: RwLock::new(SessionState::Created),
            record: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn record(&self) -> Option<SessionRecord> {
        self.record.read().await.clone()
    }

    /// Acquire a port, register this session, and begin the heartbeat and
    /// cleanup loops. Returns the bound listener for the control plane to
    /// serve on — binding failure is the one fatal startup error.
    pub async fn start(self: &Arc<Self>) -> MeshResult<TcpListener> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Created {
                return Err(MeshError::InvalidArgument(format!(
                    "session already started (state: {:?})",
                    *state
                )));
            }
            *state = SessionState::Running;
        }

        let (port, listener) = crate::net::PortAllocator::acquire(
            &self.mesh.bind_host,
            self.mesh.port_range(),
        )
        .await?;

        let record = SessionRecord {
            id: self.identity.id,
            process_id: self.identity.process_id,
            workspace_ref: self.identity.workspace_ref.clone(),
            window_ref: self.identity.window_ref,
            capabilities: self.capabilities.clone(),
            last_seen: Utc::now(),
            port,
            peers: vec![],
        };
        *self.record.write().await = Some(record.clone());

        // Registration failure is degraded-but-alive: the session serves
        // callers that already know its port, it's just invisible to peers.
        if let Err(err) = self.persist_own_record().await {
            tracing::warn!(%err, "Failed to register session; running degraded");
        } else {
            tracing::info!(
                session = %self.identity.short_id(),
                port,
                workspace = ?self.identity.workspace_ref,
                "Session registered"
            );
        }

        self.spawn_timers().await;
        Ok(listener)
    }

    async fn spawn_timers(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;

        let heartbeat = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat.mesh.heartbeat_interval());
            interval.tick().await; // registration already wrote the record
            loop {
                interval.tick().await;
                heartbeat.heartbeat().await;
            }
        }));

        let cleanup = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup.mesh.cleanup_interval());
            interval.tick().await;
            loop {
                interval.tick().await;
                cleanup.cleanup().await;
            }
        }));
    }

    /// Refresh `lastSeen` and the denormalized peer list, then re-persist.
    pub async fn heartbeat(&self) {
        let peer_ids = self.peers.connected_ids().await;
        {
            let mut record = self.record.write().await;
            if let Some(rec) = record.as_mut() {
                rec.last_seen = Utc::now();
                rec.peers = peer_ids;
            } else {
                return;
            }
        }
        if let Err(err) = self.persist_own_record().await {
            tracing::warn!(%err, "Heartbeat persist failed");
        }
    }

    /// Refresh `lastSeen` only. Side effect of most control-plane reads.
    pub async fn touch(&self) {
        {
            let mut record = self.record.write().await;
            if let Some(rec) = record.as_mut() {
                rec.last_seen = Utc::now();
            } else {
                return;
            }
        }
        if let Err(err) = self.persist_own_record().await {
            tracing::debug!(%err, "Touch persist failed");
        }
    }

    /// Cooperative eviction pass: any session removes anyone's stale record.
    /// Endpoints scoped to evicted sessions are torn down locally.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let threshold = self.mesh.staleness_threshold();
        let own_id = self.identity.id;
        let mut evicted: Vec<Uuid> = Vec::new();

        let result = self.store.update(&mut |sessions| {
            evicted = sessions
                .iter()
                .filter(|(id, rec)| **id != own_id && rec.is_stale(now, threshold))
                .map(|(id, _)| *id)
                .collect();
            for id in &evicted {
                sessions.remove(id);
            }
        });

        if let Err(err) = result {
            tracing::warn!(%err, "Cleanup pass could not write registry");
            return;
        }

        for id in &evicted {
            self.peers.remove(*id).await;
            let removed = self.endpoints.remove_owned_by(*id);
            if removed > 0 {
                tracing::info!(session = %id, endpoints = removed, "Tore down endpoints of evicted session");
            }
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted stale sessions");
        }
    }

    /// Deregister and tear everything down. Failures along the way are
    /// logged, never propagated — `stop` always terminates the session.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if matches!(*state, SessionState::Stopping | SessionState::Terminated) {
                return;
            }
            *state = SessionState::Stopping;
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        let own_id = self.identity.id;
        if let Err(err) = self.store.update(&mut |sessions| {
            sessions.remove(&own_id);
        }) {
            tracing::warn!(%err, "Failed to deregister session; peers will evict the stale record");
        }

        let removed = self.endpoints.remove_owned_by(own_id);
        if removed > 0 {
            tracing::debug!(endpoints = removed, "Removed own dynamic endpoints");
        }

        *self.record.write().await = None;
        *self.state.write().await = SessionState::Terminated;
        tracing::info!(session = %self.identity.short_id(), "Session stopped");
    }

    /// Read-merge-write of this session's record into the shared store.
    async fn persist_own_record(&self) -> MeshResult<()> {
        let record = match self.record.read().await.clone() {
            Some(record) => record,
            None => return Ok(()),
        };
        self.store.update(&mut |sessions| {
            sessions.insert(record.id, record.clone());
        })
    }
}
