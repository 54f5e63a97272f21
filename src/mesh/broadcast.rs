// Broadcast router — fan one request out to every connected peer.
//
// Each peer gets its own request with its own timeout; one hung or dead
// peer never stalls or aborts delivery to the rest. The result set always
// has exactly one entry per targeted peer. Ordering is whatever the peer
// iteration produced — callers must not depend on it.

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use super::peers::{PeerRecord, PeerTable};

/// Per-peer outcome of one broadcast. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerOutcome {
    pub session_id: Uuid,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct BroadcastRouter {
    http: Client,
    peers: PeerTable,
}

impl BroadcastRouter {
    pub fn new(peers: PeerTable, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for peer calls")?;
        Ok(Self { http, peers })
    }

    /// POST `payload` to `route` on every connected peer.
    pub async fn broadcast(&self, route: &str, payload: &Value) -> Vec<PeerOutcome> {
        let route = normalize_route(route);
        let targets = self.peers.connected().await;
        tracing::debug!(route = %route, peers = targets.len(), "Broadcasting");

        let requests = targets
            .iter()
            .map(|peer| self.deliver(peer, &route, payload));
        join_all(requests).await
    }

    async fn deliver(&self, peer: &PeerRecord, route: &str, payload: &Value) -> PeerOutcome {
        let url = format!("{}{}", peer.base_addr, route);
        let response = self.http.post(&url).json(payload).send().await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                // Peer answered; non-2xx is still that peer's answer, with
                // the body preserved for the caller.
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|err| format!("unreadable response body: {err}"));
                let value = serde_json::from_str::<Value>(&body)
                    .unwrap_or_else(|_| Value::String(body));
                if status.is_success() {
                    PeerOutcome {
                        session_id: peer.session_id,
                        port: peer.port,
                        result: Some(value),
                        error: None,
                    }
                } else {
                    PeerOutcome {
                        session_id: peer.session_id,
                        port: peer.port,
                        result: None,
                        error: Some(format!("peer returned {status}: {value}")),
                    }
                }
            }
            Err(err) => {
                tracing::debug!(peer = %peer.session_id, %err, "Peer unreachable during broadcast");
                PeerOutcome {
                    session_id: peer.session_id,
                    port: peer.port,
                    result: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

fn normalize_route(route: &str) -> String {
    if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    }
}
