// The persisted shape of one live session.
//
// Field names are camelCase on the wire — the registry document and the
// `GET /session` response share this struct, and external callers (the CLI
// and MCP bridges) already speak that casing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in the shared session registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Globally unique, generated once per process lifetime.
    pub id: Uuid,

    /// OS process id. Informational only — never used for liveness checks.
    pub process_id: u32,

    /// Logical workspace this instance is attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_ref: Option<String>,

    /// Distinguishes windows sharing one workspace.
    pub window_ref: u32,

    /// Capability names declared at startup. Immutable after discovery.
    pub capabilities: Vec<String>,

    /// Refreshed on every heartbeat and on most control-plane reads.
    pub last_seen: DateTime<Utc>,

    /// The exclusively-owned control-plane port.
    pub port: u16,

    /// This session's own view of known peer ids. A denormalized cache —
    /// the registry itself is the authority.
    #[serde(default)]
    pub peers: Vec<Uuid>,
}

impl SessionRecord {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.last_seen)
    }

    /// True once `last_seen` is older than `threshold`. Any session may
    /// evict a stale record, not just its owner.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.age(now) > threshold
    }
}
