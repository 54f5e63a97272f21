// Session identity — one per process lifetime.
//
// Unlike a node identity persisted to disk, a session id is deliberately
// ephemeral: a restarted process is a new session and must re-register.

use uuid::Uuid;

/// Identity of this process's session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Fresh per process; never reused across restarts.
    pub id: Uuid,
    /// OS process id, informational.
    pub process_id: u32,
    /// Host machine name, for log readability.
    pub hostname: String,
    /// Logical workspace this instance is attached to.
    pub workspace_ref: Option<String>,
    /// Distinguishes windows sharing one workspace.
    pub window_ref: u32,
}

impl SessionIdentity {
    pub fn new(workspace_ref: Option<String>, window_ref: u32) -> Self {
        let id = Uuid::new_v4();
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| format!("wren-{}", &id.to_string()[..8]));
        Self {
            id,
            process_id: std::process::id(),
            hostname,
            workspace_ref,
            window_ref,
        }
    }

    /// Short display prefix (first 8 chars of the UUID).
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}
