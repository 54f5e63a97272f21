// Project-wide constants
//
// Centralised here so port numbers and timing values have one source of
// truth. Import via `use crate::config::constants::*;`.

/// First candidate port for a session's control-plane listener.
pub const DEFAULT_PORT_RANGE_START: u16 = 3637;

/// Last candidate port (inclusive).
pub const DEFAULT_PORT_RANGE_END: u16 = 3697;

/// Default bind host. The control plane is localhost-only; nothing here is
/// authenticated, so never bind a wider interface by default.
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// How often a session re-persists its own record with a fresh `lastSeen`.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// How often the peer table is reconciled against the shared registry.
pub const DISCOVERY_INTERVAL_SECS: u64 = 10;

/// How often each session runs its cooperative eviction pass.
pub const CLEANUP_INTERVAL_SECS: u64 = 30;

/// Age past which a record is considered dead and evicted by anyone.
///
/// Must stay at least 3x the heartbeat interval, otherwise a live but slow
/// session gets evicted by a peer's cleanup pass between its own heartbeats.
/// `Config::validate` enforces this for user-supplied values.
pub const STALENESS_THRESHOLD_SECS: u64 = 60;

/// Per-peer timeout for broadcast and targeted peer calls.
pub const PEER_REQUEST_TIMEOUT_SECS: u64 = 2;

/// Version of the persisted registry document. Bump on layout changes;
/// readers treat unknown versions as an empty registry.
pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

/// Request body cap for the control plane.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
