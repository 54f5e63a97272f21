// Mesh coordination: peer view, discovery, and fan-out.

mod broadcast;
mod discovery;
mod peers;

pub use broadcast::{BroadcastRouter, PeerOutcome};
pub use discovery::DiscoveryEngine;
pub use peers::{PeerRecord, PeerTable, ReconcileSummary};
