// Integration tests for the control-plane HTTP surface, exercised
// in-process via tower's oneshot.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use wren::config::MeshConfig;
use wren::exec::ExecutionGateway;
use wren::host::{EchoBridge, HostBridge};
use wren::mesh::{BroadcastRouter, PeerTable};
use wren::registry::FileRegistryStore;
use wren::server::{create_router, AppState, DynamicEndpointRegistry};
use wren::session::{SessionIdentity, SessionManager};

struct TestPlane {
    router: axum::Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

/// Build a started session plus its router. Each test gets its own port
/// range so parallel tests never contend for a port.
async fn test_plane(port_start: u16, port_end: u16) -> TestPlane {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileRegistryStore::new(dir.path().join("registry.json")));

    let bridge: Arc<dyn HostBridge> = Arc::new(EchoBridge);
    let capabilities = bridge
        .capabilities()
        .iter()
        .map(|c| c.qualified_name())
        .collect();

    let peers = PeerTable::new();
    let endpoints = Arc::new(DynamicEndpointRegistry::new());
    let mut mesh = MeshConfig::default();
    mesh.port_range_start = port_start;
    mesh.port_range_end = port_end;

    let manager = SessionManager::new(
        SessionIdentity::new(Some("file:///work/plane".to_string()), 0),
        capabilities,
        store,
        Arc::clone(&endpoints),
        peers.clone(),
        mesh,
    );
    // Oneshot tests drive the router directly; the bound listener is unused.
    let _listener = manager.start().await.unwrap();

    let state = Arc::new(AppState {
        manager,
        peers: peers.clone(),
        endpoints,
        gateway: ExecutionGateway::new(Arc::clone(&bridge)),
        broadcast: BroadcastRouter::new(peers, Duration::from_millis(500)).unwrap(),
        bridge,
    });

    TestPlane {
        router: create_router(Arc::clone(&state)),
        state,
        _dir: dir,
    }
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(router: &axum::Router, path: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder().uri(path).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post_json(router: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_health_reports_session_id() {
    let plane = test_plane(43600, 43604).await;
    let (status, body) = get(&plane.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessionId"], plane.state.manager.id().to_string());
}

#[tokio::test]
async fn test_get_session_returns_record_and_refreshes_last_seen() {
    let plane = test_plane(43605, 43609).await;

    let (status, first) = get(&plane.router, "/session").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], plane.state.manager.id().to_string());
    assert_eq!(first["workspaceRef"], "file:///work/plane");
    assert!(first["port"].as_u64().unwrap() >= 43605);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let (_, second) = get(&plane.router, "/session").await;
    let a = first["lastSeen"].as_str().unwrap();
    let b = second["lastSeen"].as_str().unwrap();
    assert!(b > a, "lastSeen must advance on reads: {a} !< {b}");
}

#[tokio::test]
async fn test_get_apis_lists_capabilities() {
    let plane = test_plane(43610, 43614).await;
    let (status, body) = get(&plane.router, "/apis").await;
    assert_eq!(status, StatusCode::OK);
    let apis = body.as_array().unwrap();
    assert_eq!(apis.len(), 2);
    assert_eq!(apis[0]["category"], "commands");
    assert!(apis[0].get("parameterShape").is_some());
}

#[tokio::test]
async fn test_command_passthrough_envelope() {
    let plane = test_plane(43615, 43619).await;
    let (status, body) = post_json(
        &plane.router,
        "/command/editor.action.formatDocument",
        json!({"args": ["a", 2]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["command"], "editor.action.formatDocument");
    assert_eq!(body["result"]["args"], json!(["a", 2]));
}

#[tokio::test]
async fn test_command_defaults_missing_args() {
    let plane = test_plane(43620, 43624).await;
    let (status, body) = post_json(&plane.router, "/command/x", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["args"], json!([]));
}

#[tokio::test]
async fn test_exec_accepts_raw_text_body() {
    let plane = test_plane(43625, 43629).await;
    let (status, body) = send(
        &plane.router,
        Request::builder()
            .method("POST")
            .uri("/exec")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("return 2"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["echo"], "return 2");
}

#[tokio::test]
async fn test_exec_accepts_json_body() {
    let plane = test_plane(43630, 43634).await;
    let (status, body) = post_json(&plane.router, "/exec", json!({"code": "return 7"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["echo"], "return 7");
}

#[tokio::test]
async fn test_exec_json_without_code_field_is_bad_request() {
    let plane = test_plane(43635, 43639).await;
    let (status, body) = post_json(&plane.router, "/exec", json!({"source": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_exec_with_action_binds_first_result() {
    let plane = test_plane(43640, 43644).await;
    let (status, body) = post_json(
        &plane.router,
        "/exec-with-action",
        json!({"code": "return 2", "onResult": "return result * 10"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The echo bridge reflects code and bindings; the reaction phase must
    // have seen the first phase's value under `result`.
    assert_eq!(body["result"]["echo"], "return 2");
    assert_eq!(body["actionResult"]["echo"], "return result * 10");
    assert_eq!(body["actionResult"]["bindings"]["result"]["echo"], "return 2");
}

#[tokio::test]
async fn test_add_endpoint_then_get_then_remove() {
    let plane = test_plane(43645, 43649).await;

    let (status, body) = post_json(
        &plane.router,
        "/add-endpoint",
        json!({"path": "/build/status", "response": {"state": "green"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = get(&plane.router, "/build/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["path"], "/build/status");
    assert_eq!(body["response"]["state"], "green");

    let (status, _) = post_json(
        &plane.router,
        "/remove-endpoint",
        json!({"path": "/build/status"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&plane.router, "/build/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_add_endpoint_rejects_relative_path() {
    let plane = test_plane(43650, 43654).await;
    let (status, body) = post_json(
        &plane.router,
        "/add-endpoint",
        json!({"path": "no-slash", "response": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_reregister_serves_second_payload() {
    let plane = test_plane(43655, 43659).await;
    post_json(
        &plane.router,
        "/add-endpoint",
        json!({"path": "/v", "response": "first"}),
    )
    .await;
    post_json(
        &plane.router,
        "/add-endpoint",
        json!({"path": "/v", "response": "second"}),
    )
    .await;

    let (_, body) = get(&plane.router, "/v").await;
    assert_eq!(body["response"], "second");
    assert_eq!(plane.state.endpoints.len(), 1);
}

#[tokio::test]
async fn test_remove_endpoint_missing_is_404() {
    let plane = test_plane(43660, 43664).await;
    let (status, body) =
        post_json(&plane.router, "/remove-endpoint", json!({"path": "/ghost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_dynamic_endpoints_are_get_only() {
    let plane = test_plane(43665, 43669).await;
    post_json(
        &plane.router,
        "/add-endpoint",
        json!({"path": "/ro", "response": 1}),
    )
    .await;

    let (status, _) = post_json(&plane.router, "/ro", json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_peers_empty_without_mesh() {
    let plane = test_plane(43670, 43674).await;
    let (status, body) = get(&plane.router, "/mesh/peers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_broadcast_with_no_peers_is_empty() {
    let plane = test_plane(43675, 43679).await;
    let (status, body) = post_json(&plane.router, "/mesh/broadcast/health", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
