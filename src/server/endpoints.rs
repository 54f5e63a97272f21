// Dynamic endpoint registry — runtime-registered, session-scoped responders.
//
// One table serves both request routing (the axum fallback consults it) and
// bookkeeping, so the two views cannot diverge the way they do when a
// framework's internal route table is mutated behind its back.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{MeshError, MeshResult};

/// Routing root marker: every dynamic path must be absolute.
pub const ROUTE_ROOT: &str = "/";

/// A runtime-registered GET responder with a static payload, owned by the
/// session that registered it and destroyed with that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicEndpoint {
    pub path: String,
    pub response: Value,
    /// Session that owns this endpoint; eviction of the owner removes it.
    pub owner: Uuid,
    pub registered_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DynamicEndpointRegistry {
    endpoints: DashMap<String, DynamicEndpoint>,
}

impl DynamicEndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a responder at `path`. Re-registering an existing path
    /// replaces the previous responder — there is never more than one
    /// handler per path.
    pub fn register(&self, path: &str, response: Value, owner: Uuid) -> MeshResult<()> {
        if !path.starts_with(ROUTE_ROOT) {
            return Err(MeshError::InvalidArgument(format!(
                "endpoint path must start with '{ROUTE_ROOT}', got '{path}'"
            )));
        }
        if path.len() == ROUTE_ROOT.len() {
            return Err(MeshError::InvalidArgument(
                "cannot register the routing root itself".to_string(),
            ));
        }

        let replaced = self
            .endpoints
            .insert(
                path.to_string(),
                DynamicEndpoint {
                    path: path.to_string(),
                    response,
                    owner,
                    registered_at: Utc::now(),
                },
            )
            .is_some();
        tracing::info!(path, %owner, replaced, "Dynamic endpoint registered");
        Ok(())
    }

    /// Remove the responder at `path`, returning it.
    pub fn remove(&self, path: &str) -> MeshResult<DynamicEndpoint> {
        match self.endpoints.remove(path) {
            Some((_, endpoint)) => {
                tracing::info!(path, "Dynamic endpoint removed");
                Ok(endpoint)
            }
            None => Err(MeshError::NotFound(format!(
                "no endpoint registered at '{path}'"
            ))),
        }
    }

    pub fn lookup(&self, path: &str) -> Option<DynamicEndpoint> {
        self.endpoints.get(path).map(|e| e.clone())
    }

    /// Drop every endpoint owned by `owner`. Called on session stop and
    /// when a cleanup pass evicts a session. Returns how many were removed.
    pub fn remove_owned_by(&self, owner: Uuid) -> usize {
        let before = self.endpoints.len();
        self.endpoints.retain(|_, endpoint| endpoint.owner != owner);
        before - self.endpoints.len()
    }

    pub fn list(&self) -> Vec<DynamicEndpoint> {
        let mut list: Vec<DynamicEndpoint> =
            self.endpoints.iter().map(|e| e.value().clone()).collect();
        list.sort_by(|a, b| a.path.cmp(&b.path));
        list
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
