// Control-plane HTTP server
//
// One axum router per session, bound to the port the session manager
// acquired. Static routes cover the fixed control surface; the fallback
// consults the dynamic endpoint registry.

mod endpoints;
mod handlers;

pub use endpoints::{DynamicEndpoint, DynamicEndpointRegistry, ROUTE_ROOT};

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::constants::MAX_BODY_BYTES;
use crate::exec::ExecutionGateway;
use crate::host::HostBridge;
use crate::mesh::{BroadcastRouter, PeerTable};
use crate::session::SessionManager;

/// Shared state behind every handler.
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub peers: PeerTable,
    pub endpoints: Arc<DynamicEndpointRegistry>,
    pub gateway: ExecutionGateway,
    pub broadcast: BroadcastRouter,
    pub bridge: Arc<dyn HostBridge>,
}

/// Build the control-plane router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/session", get(handlers::get_session))
        .route("/apis", get(handlers::get_apis))
        .route("/command/:id", post(handlers::post_command))
        .route("/exec", post(handlers::post_exec))
        .route("/exec-with-action", post(handlers::post_exec_with_action))
        .route("/add-endpoint", post(handlers::post_add_endpoint))
        .route("/remove-endpoint", post(handlers::post_remove_endpoint))
        .route("/mesh/peers", get(handlers::get_peers))
        .route("/mesh/broadcast/:endpoint", post(handlers::post_broadcast))
        .fallback(handlers::dynamic_endpoint)
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the control plane on the session's pre-bound listener until
/// `shutdown` resolves.
pub async fn serve(
    state: Arc<AppState>,
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Control plane listening");
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
