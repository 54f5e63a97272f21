// Exclusive port acquisition by real bind probing.
//
// Registry bookkeeping is never consulted: a crashed session leaves a stale
// record behind, so the only trustworthy signal is whether the OS will hand
// us the socket. The successful probe keeps the bound listener and returns
// it — the caller serves on that same listener, so there is no window in
// which another process can steal the port between probe and serve.

use tokio::net::TcpListener;

use crate::error::{MeshError, MeshResult};

pub struct PortAllocator;

impl PortAllocator {
    /// Scan `range` in ascending order and return the first port that can be
    /// bound on `host`, together with the live listener.
    ///
    /// Fails with `ResourceExhausted` when every candidate is taken.
    pub async fn acquire(
        host: &str,
        range: std::ops::RangeInclusive<u16>,
    ) -> MeshResult<(u16, TcpListener)> {
        let (min, max) = (*range.start(), *range.end());
        for port in range {
            match TcpListener::bind((host, port)).await {
                Ok(listener) => {
                    tracing::debug!(port, "Acquired control-plane port");
                    return Ok((port, listener));
                }
                Err(err) => {
                    tracing::trace!(port, %err, "Port candidate unavailable");
                }
            }
        }
        Err(MeshError::ResourceExhausted { min, max })
    }
}
