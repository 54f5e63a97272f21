// Control-plane HTTP handlers.
//
// Contract notes: execution failures travel inside a 200 envelope
// (`{success:false, error}`) — they are results, not transport errors.
// Transport-level statuses are reserved for bad requests (400), unknown
// targets (404), and a session that has no record yet (503).

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::error::MeshError;

fn error_status(err: &MeshError) -> StatusCode {
    match err {
        MeshError::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MeshError::NotFound(_) => StatusCode::NOT_FOUND,
        MeshError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        // Execution failures are structured results, not HTTP errors.
        MeshError::ExecutionFailure(_) => StatusCode::OK,
        MeshError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
        MeshError::RegistryIo(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: &MeshError) -> Response {
    (
        error_status(err),
        Json(json!({"success": false, "error": err.to_string()})),
    )
        .into_response()
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "ok",
        "sessionId": state.manager.id(),
    }))
    .into_response()
}

/// GET /session — returns this session's record, refreshing `lastSeen`.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Response {
    state.manager.touch().await;
    match state.manager.record().await {
        Some(record) => Json(record).into_response(),
        None => error_response(&MeshError::RegistryIo(
            "session has no active record".to_string(),
        )),
    }
}

/// GET /apis — host capabilities discovered at startup.
pub async fn get_apis(State(state): State<Arc<AppState>>) -> Response {
    Json(state.bridge.capabilities()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub args: Vec<Value>,
}

/// POST /command/:id — pass-through to a host-owned command.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Path(command_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Response {
    match state.bridge.execute_command(&command_id, &request.args).await {
        Ok(result) => Json(json!({"success": true, "result": result})).into_response(),
        Err(err @ MeshError::InvalidArgument(_)) => error_response(&err),
        Err(err) => Json(json!({"success": false, "error": err.to_string()})).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ExecRequest {
    code: String,
}

/// POST /exec — body is either JSON `{code}` or raw source text.
pub async fn post_exec(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let code = if is_json(&headers) {
        match serde_json::from_str::<ExecRequest>(&body) {
            Ok(request) => request.code,
            Err(err) => {
                return error_response(&MeshError::InvalidArgument(format!(
                    "expected JSON body with a 'code' field: {err}"
                )))
            }
        }
    } else {
        body
    };

    let outcome = state.gateway.execute(&code).await;
    if outcome.success {
        Json(outcome.result.unwrap_or(Value::Null)).into_response()
    } else {
        Json(json!({"success": false, "error": outcome.error})).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecWithActionRequest {
    pub code: String,
    #[serde(rename = "onResult")]
    pub on_result: String,
}

/// POST /exec-with-action — compute, then react to the value in-process.
pub async fn post_exec_with_action(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecWithActionRequest>,
) -> Response {
    let outcome = state
        .gateway
        .execute_with_reaction(&request.code, &request.on_result)
        .await;

    if !outcome.result.success {
        return Json(json!({"success": false, "error": outcome.result.error})).into_response();
    }

    let mut response = json!({
        "result": outcome.result.result.unwrap_or(Value::Null),
        "actionResult": Value::Null,
    });
    match outcome.reaction {
        Some(reaction) if reaction.success => {
            response["actionResult"] = reaction.result.unwrap_or(Value::Null);
        }
        Some(reaction) => {
            // Reaction failure is independent of first-phase success.
            response["actionError"] = json!(reaction.error);
        }
        None => {}
    }
    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AddEndpointRequest {
    pub path: String,
    #[serde(default)]
    pub response: Value,
    /// Owning session; defaults to the local session. Broadcast-installed
    /// endpoints pass the originator so eviction tears them down.
    #[serde(default)]
    pub owner: Option<Uuid>,
}

/// POST /add-endpoint
pub async fn post_add_endpoint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddEndpointRequest>,
) -> Response {
    let owner = request.owner.unwrap_or_else(|| state.manager.id());
    match state.endpoints.register(&request.path, request.response, owner) {
        Ok(()) => Json(json!({"success": true, "path": request.path})).into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveEndpointRequest {
    pub path: String,
}

/// POST /remove-endpoint
pub async fn post_remove_endpoint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RemoveEndpointRequest>,
) -> Response {
    match state.endpoints.remove(&request.path) {
        Ok(_) => Json(json!({"success": true, "path": request.path})).into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET /mesh/peers
pub async fn get_peers(State(state): State<Arc<AppState>>) -> Response {
    Json(state.peers.list().await).into_response()
}

/// POST /mesh/broadcast/:endpoint — fan the payload out to every connected
/// peer. Always 200 with one entry per peer; partial failure is data.
pub async fn post_broadcast(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
    body: String,
) -> Response {
    let payload = if body.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body))
    };

    let outcomes = state.broadcast.broadcast(&endpoint, &payload).await;
    Json(outcomes).into_response()
}

/// Fallback: serve dynamic endpoints registered at runtime.
pub async fn dynamic_endpoint(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"success": false, "error": "dynamic endpoints are GET-only"})),
        )
            .into_response();
    }
    match state.endpoints.lookup(uri.path()) {
        Some(endpoint) => Json(json!({
            "success": true,
            "path": endpoint.path,
            "response": endpoint.response,
        }))
        .into_response(),
        None => error_response(&MeshError::NotFound(format!(
            "no endpoint registered at '{}'",
            uri.path()
        ))),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("json"))
        .unwrap_or(false)
}
