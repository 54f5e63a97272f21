// Wren — mesh coordination and control plane for embedded automation bridges.
//
// A host application embeds this library, hands it a `HostBridge`, and gets
// back a discoverable, addressable session: exclusive port, shared-registry
// registration, heartbeat/staleness handling, a localhost control plane,
// runtime-registered endpoints, and per-peer broadcast.

pub mod config;
pub mod error;
pub mod exec;
pub mod host;
pub mod mesh;
pub mod net;
pub mod registry;
pub mod server;
pub mod session;
