// Configuration structs

use super::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration, loaded from `~/.wren/config.toml` (see loader.rs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Mesh timing and port-range settings.
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Shared registry location.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Session identity settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Timing and port-range knobs for the coordination layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Bind host for the control-plane listener (localhost only by default).
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// First candidate port (inclusive).
    #[serde(default = "default_port_start")]
    pub port_range_start: u16,

    /// Last candidate port (inclusive).
    #[serde(default = "default_port_end")]
    pub port_range_end: u16,

    /// Seconds between heartbeat re-persists of this session's record.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval_secs: u64,

    /// Seconds between peer-table reconciliation passes.
    #[serde(default = "default_discovery")]
    pub discovery_interval_secs: u64,

    /// Seconds between cooperative eviction passes.
    #[serde(default = "default_cleanup")]
    pub cleanup_interval_secs: u64,

    /// Seconds after which an un-refreshed record is evicted by any session.
    #[serde(default = "default_staleness")]
    pub staleness_threshold_secs: u64,

    /// Per-peer timeout for broadcast requests, in seconds.
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_secs: u64,
}

/// Location of the shared session registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Override for the registry file path. Defaults to `~/.wren/registry.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Identity settings for this session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Logical workspace this instance is attached to, for workspace-based
    /// targeting. Optional; usually supplied by the embedding host.
    #[serde(default)]
    pub workspace_ref: Option<String>,

    /// Distinguishes windows when several instances share a workspace.
    #[serde(default)]
    pub window_ref: u32,
}

fn default_bind_host() -> String {
    constants::DEFAULT_BIND_HOST.to_string()
}
fn default_port_start() -> u16 {
    constants::DEFAULT_PORT_RANGE_START
}
fn default_port_end() -> u16 {
    constants::DEFAULT_PORT_RANGE_END
}
fn default_heartbeat() -> u64 {
    constants::HEARTBEAT_INTERVAL_SECS
}
fn default_discovery() -> u64 {
    constants::DISCOVERY_INTERVAL_SECS
}
fn default_cleanup() -> u64 {
    constants::CLEANUP_INTERVAL_SECS
}
fn default_staleness() -> u64 {
    constants::STALENESS_THRESHOLD_SECS
}
fn default_peer_timeout() -> u64 {
    constants::PEER_REQUEST_TIMEOUT_SECS
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port_range_start: default_port_start(),
            port_range_end: default_port_end(),
            heartbeat_interval_secs: default_heartbeat(),
            discovery_interval_secs: default_discovery(),
            cleanup_interval_secs: default_cleanup(),
            staleness_threshold_secs: default_staleness(),
            peer_timeout_secs: default_peer_timeout(),
        }
    }
}

impl MeshConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staleness_threshold_secs as i64)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }

    pub fn port_range(&self) -> std::ops::RangeInclusive<u16> {
        self.port_range_start..=self.port_range_end
    }
}

impl Config {
    /// Reject configurations that violate the coordination invariants.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mesh = &self.mesh;
        if mesh.port_range_start > mesh.port_range_end {
            anyhow::bail!(
                "invalid port range: {} > {}",
                mesh.port_range_start,
                mesh.port_range_end
            );
        }
        if mesh.heartbeat_interval_secs == 0 {
            anyhow::bail!("heartbeat_interval_secs must be non-zero");
        }
        // A threshold below 3x the heartbeat lets a live session be evicted
        // by a peer between its own heartbeats.
        if mesh.staleness_threshold_secs < mesh.heartbeat_interval_secs * 3 {
            anyhow::bail!(
                "staleness_threshold_secs ({}) must be at least 3x heartbeat_interval_secs ({})",
                mesh.staleness_threshold_secs,
                mesh.heartbeat_interval_secs
            );
        }
        Ok(())
    }
}
