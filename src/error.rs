// Error taxonomy for the mesh control plane.
//
// Propagation policy: registry and endpoint-teardown failures are logged and
// absorbed (a session keeps running in a degraded state rather than dying);
// execution and broadcast failures travel back to callers as structured
// results. The only startup-fatal error is failing to bind a listening port.

use thiserror::Error;
use uuid::Uuid;

pub type MeshResult<T> = Result<T, MeshError>;

#[derive(Debug, Error)]
pub enum MeshError {
    /// No free port in the configured range.
    #[error("no free port available in range {min}-{max}")]
    ResourceExhausted { min: u16, max: u16 },

    /// Unknown session, workspace target, or dynamic endpoint.
    #[error("{0}")]
    NotFound(String),

    /// Malformed path or payload.
    #[error("{0}")]
    InvalidArgument(String),

    /// The host evaluator or command rejected the request.
    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    /// A peer call timed out or was refused. Per-peer, never fatal to a fan-out.
    #[error("peer {session_id} unreachable: {reason}")]
    PeerUnreachable { session_id: Uuid, reason: String },

    /// The shared registry could not be read or written. Readers degrade to
    /// an empty view instead of surfacing this.
    #[error("registry I/O failure: {0}")]
    RegistryIo(String),
}

impl MeshError {
    pub fn registry_io(err: impl std::fmt::Display) -> Self {
        MeshError::RegistryIo(err.to_string())
    }
}
