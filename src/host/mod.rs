// The host collaborator boundary.
//
// Everything host-specific — command dispatch, UI wrappers, the actual
// evaluator — lives behind `HostBridge`. The mesh never enumerates host
// APIs itself; it only routes to this trait. Keeping the evaluator here
// also keeps it swappable for a stricter sandbox without touching the
// gateway protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MeshError, MeshResult};

/// Named values made visible to evaluated code. The set is bounded and
/// caller-controlled; the two-phase gateway binds the first-phase value
/// under `result`.
pub type Bindings = serde_json::Map<String, Value>;

/// Discovery-time metadata for one host capability. Read-only after the
/// bridge finishes discovery; new items may only be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedCapability {
    pub category: String,
    pub method: String,
    pub parameter_shape: String,
    pub description: String,
}

impl ExposedCapability {
    /// Capability name as recorded in a session's registry entry.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.category, self.method)
    }
}

/// What the embedding host must provide.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Capabilities discovered/declared at startup.
    fn capabilities(&self) -> Vec<ExposedCapability>;

    /// Pass-through to a host-owned command.
    async fn execute_command(&self, command_id: &str, args: &[Value]) -> MeshResult<Value>;

    /// Evaluate source text against `bindings` inside the host process.
    async fn evaluate(&self, code: &str, bindings: &Bindings) -> MeshResult<Value>;
}

/// Development bridge for running a session without a real host: commands
/// and code are echoed back as structured values. Used by the standalone
/// binary and by integration tests that exercise the control plane.
pub struct EchoBridge;

#[async_trait]
impl HostBridge for EchoBridge {
    fn capabilities(&self) -> Vec<ExposedCapability> {
        vec![
            ExposedCapability {
                category: "commands".to_string(),
                method: "execute".to_string(),
                parameter_shape: "{commandId, args[]}".to_string(),
                description: "Echoes the command id and arguments".to_string(),
            },
            ExposedCapability {
                category: "eval".to_string(),
                method: "run".to_string(),
                parameter_shape: "{code}".to_string(),
                description: "Echoes the submitted code and bindings".to_string(),
            },
        ]
    }

    async fn execute_command(&self, command_id: &str, args: &[Value]) -> MeshResult<Value> {
        if command_id.is_empty() {
            return Err(MeshError::InvalidArgument("empty command id".to_string()));
        }
        Ok(serde_json::json!({
            "command": command_id,
            "args": args,
            "echoed": true,
        }))
    }

    async fn evaluate(&self, code: &str, bindings: &Bindings) -> MeshResult<Value> {
        Ok(serde_json::json!({
            "echo": code,
            "bindings": Value::Object(bindings.clone()),
        }))
    }
}
