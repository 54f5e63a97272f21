// Shared session registry
//
// Cross-process discovery runs through a single persisted mapping of
// session id -> record. The store is an explicit seam so the file backend's
// loose consistency stays an isolated, swappable concern.

mod file_store;

pub use file_store::FileRegistryStore;

use std::collections::HashMap;
use uuid::Uuid;

use crate::error::MeshResult;
use crate::session::SessionRecord;

pub type SessionMap = HashMap<Uuid, SessionRecord>;

/// Backend-agnostic view of the shared registry.
///
/// `read` never fails: a missing or corrupt store is "no peers yet", and a
/// session must keep running (degraded, invisible to peers) rather than
/// crash on registry trouble. `write` replaces the whole mapping —
/// last-write-wins. Lifecycle paths that need read-modify-write atomicity
/// against concurrent processes go through `update`, which the backend
/// serializes.
pub trait RegistryStore: Send + Sync {
    /// Snapshot of the persisted mapping; empty on missing/corrupt store.
    fn read(&self) -> SessionMap;

    /// Replace the persisted mapping wholesale.
    fn write(&self, sessions: &SessionMap) -> MeshResult<()>;

    /// Locked read-modify-write. The mutation runs under an exclusive
    /// cross-process lock so concurrent sessions cannot clobber each other.
    fn update(&self, mutate: &mut dyn FnMut(&mut SessionMap)) -> MeshResult<()>;
}
