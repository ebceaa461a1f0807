//! Integration tests for the Jupyter REST connection and the bridge.
//!
//! A minimal Jupyter Server stand-in runs on an ephemeral local port.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use livecell_core::{
    CellOutput, ComputeServer, Config, ExecuteOptions, KernelReply, Notebook, NotebookOrchestrator,
    ServerOptions, ServerStatus, SessionManager, Status, StatusBus, StatusMessage,
};
use livecell_server::{Bridge, ClientMessage, JupyterServer, KernelTransport, ServerError, ServerMessage};

// =============================================================================
// Test Helpers
// =============================================================================

#[derive(Default)]
struct FakeJupyter {
    refuse_sessions: AtomicBool,
    session_bodies: Mutex<Vec<Value>>,
    restarted: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

async fn create_session(State(fake): State<Arc<FakeJupyter>>, Json(body): Json<Value>) -> Response {
    fake.session_bodies.lock().unwrap().push(body.clone());
    if fake.refuse_sessions.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "No such kernel").into_response();
    }
    let kernel = body["kernel"]["name"].as_str().unwrap_or("python3").to_string();
    let session = json!({
        "id": "s-1",
        "name": body["name"],
        "path": body["path"],
        "type": "notebook",
        "kernel": {"id": "k-1", "name": kernel, "execution_state": "idle"}
    });
    (StatusCode::CREATED, Json(session)).into_response()
}

async fn delete_session(State(fake): State<Arc<FakeJupyter>>, Path(id): Path<String>) -> StatusCode {
    fake.deleted.lock().unwrap().push(id);
    StatusCode::NO_CONTENT
}

async fn restart_kernel(State(fake): State<Arc<FakeJupyter>>, Path(id): Path<String>) -> Json<Value> {
    fake.restarted.lock().unwrap().push(id.clone());
    Json(json!({"id": id, "name": "python3", "execution_state": "starting"}))
}

/// Start the stand-in and return its base URL.
async fn spawn_fake(fake: Arc<FakeJupyter>) -> String {
    let app = Router::new()
        .route(
            "/api/status",
            get(|| async { Json(json!({"started": "2026-01-01T00:00:00Z", "connections": 0, "kernels": 0})) }),
        )
        .route(
            "/api/kernelspecs",
            get(|| async {
                Json(json!({
                    "default": "python3",
                    "kernelspecs": {
                        "python3": {"name": "python3", "spec": {"display_name": "Python 3", "language": "python"}},
                        "ir": {"name": "ir", "spec": {"display_name": "R", "language": "R"}}
                    }
                }))
            }),
        )
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", delete(delete_session))
        .route("/api/kernels/{id}/restart", post(restart_kernel))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Transport that answers every request with its own source.
#[derive(Default)]
struct EchoTransport {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl KernelTransport for EchoTransport {
    async fn execute(&self, kernel_id: &str, code: &str) -> livecell_core::Result<KernelReply> {
        self.calls
            .lock()
            .unwrap()
            .push((kernel_id.to_string(), code.to_string()));
        Ok(KernelReply {
            outputs: vec![CellOutput::text(code)],
            ..Default::default()
        })
    }
}

fn options(base_url: String) -> ServerOptions {
    ServerOptions {
        base_url,
        ready_poll_interval_ms: 10,
        max_ready_attempts: 3,
    }
}

fn config(base_url: String) -> Config {
    Config {
        server: options(base_url),
        ..Default::default()
    }
}

fn record(bus: &StatusBus) -> (livecell_core::Subscription, Arc<Mutex<Vec<StatusMessage>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = bus.subscribe(move |msg| sink.lock().unwrap().push(msg.clone()));
    (subscription, seen)
}

fn server_statuses(seen: &[StatusMessage]) -> Vec<ServerStatus> {
    seen.iter()
        .filter_map(|m| match m.status {
            Status::Server(s) => Some(s),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_reports_ready() {
    let base_url = spawn_fake(Arc::new(FakeJupyter::default())).await;
    let bus = StatusBus::new();
    let (_subscription, seen) = record(&bus);
    let server = JupyterServer::new(options(base_url), bus);

    assert!(!server.is_ready());
    let info = server.connect().await.unwrap();

    assert!(server.is_ready());
    assert_eq!(info.started.as_deref(), Some("2026-01-01T00:00:00Z"));
    assert_eq!(
        server_statuses(&seen.lock().unwrap()),
        vec![ServerStatus::Launching, ServerStatus::Ready]
    );

    server.close();
    assert!(!server.is_ready());
    assert_eq!(server_statuses(&seen.lock().unwrap()).last(), Some(&ServerStatus::Closed));
}

#[tokio::test]
async fn test_connect_gives_up_after_max_attempts() {
    // Reserve a port, then free it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let bus = StatusBus::new();
    let (_subscription, seen) = record(&bus);
    let server = JupyterServer::new(options(base_url), bus);

    let err = server.connect().await.unwrap_err();
    assert!(matches!(err, ServerError::Unreachable { attempts: 3, .. }));
    assert!(!server.is_ready());
    assert_eq!(
        server_statuses(&seen.lock().unwrap()),
        vec![ServerStatus::Launching, ServerStatus::Failed]
    );
}

// =============================================================================
// Sessions over REST
// =============================================================================

#[tokio::test]
async fn test_session_lifecycle_over_rest() {
    let fake = Arc::new(FakeJupyter::default());
    let base_url = spawn_fake(fake.clone()).await;
    let bus = StatusBus::new();
    let transport = Arc::new(EchoTransport::default());
    let server = Arc::new(
        JupyterServer::new(options(base_url.clone()), bus.clone()).with_transport(transport.clone()),
    );
    server.connect().await.unwrap();

    let manager = SessionManager::from_config(server.clone(), &config(base_url), bus.clone());
    manager.start().await;
    assert!(manager.is_ready(), "{:?}", manager.error());
    assert_eq!(manager.state().session_id.as_deref(), Some("s-1"));
    assert_eq!(
        fake.session_bodies.lock().unwrap()[0],
        json!({"name": "default", "path": "default", "type": "notebook", "kernel": {"name": "python"}})
    );

    let orchestrator = NotebookOrchestrator::new(bus.clone());
    orchestrator.set_notebook(Arc::new(Notebook::from_sources("nb", ["a = 1", "a"], bus)));
    orchestrator.set_session(manager.session());
    let results = orchestrator.execute_all(ExecuteOptions::default()).await.unwrap();
    assert!(results.iter().flatten().all(|r| r.success));
    assert_eq!(
        *transport.calls.lock().unwrap(),
        vec![("k-1".to_string(), "a = 1".to_string()), ("k-1".to_string(), "a".to_string())]
    );

    manager.restart().await;
    assert_eq!(*fake.restarted.lock().unwrap(), vec!["k-1"]);
    assert!(manager.is_ready());

    manager.shutdown().await;
    assert_eq!(*fake.deleted.lock().unwrap(), vec!["s-1"]);
    assert!(!manager.is_ready());
}

#[tokio::test]
async fn test_refused_session_lists_kernelspecs() {
    let fake = Arc::new(FakeJupyter::default());
    fake.refuse_sessions.store(true, Ordering::SeqCst);
    let base_url = spawn_fake(fake).await;
    let bus = StatusBus::new();
    let server = Arc::new(JupyterServer::new(options(base_url.clone()), bus.clone()));
    server.connect().await.unwrap();

    let manager = SessionManager::from_config(server, &config(base_url), bus);
    manager.start().await;

    assert!(!manager.is_ready());
    let error = manager.error().unwrap();
    assert!(error.contains("python3"), "{}", error);
    assert!(error.contains("ir"), "{}", error);
}

#[tokio::test]
async fn test_cells_rejected_without_transport() {
    let base_url = spawn_fake(Arc::new(FakeJupyter::default())).await;
    let bus = StatusBus::new();
    let server = Arc::new(JupyterServer::new(options(base_url.clone()), bus.clone()));
    server.connect().await.unwrap();
    let manager = SessionManager::from_config(server, &config(base_url), bus.clone());
    manager.start().await;

    let orchestrator = NotebookOrchestrator::new(bus.clone());
    orchestrator.set_notebook(Arc::new(Notebook::from_sources("nb", ["1", "2"], bus)));
    orchestrator.set_session(manager.session());

    let results = orchestrator.execute_all(ExecuteOptions::default()).await.unwrap();
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.error.as_ref().unwrap().ename, "ExecutionRejected");
    assert!(results[1].is_none());
}

// =============================================================================
// Bridge
// =============================================================================

async fn bridge() -> Bridge {
    let base_url = spawn_fake(Arc::new(FakeJupyter::default())).await;
    let bus = StatusBus::new();
    let server = Arc::new(
        JupyterServer::new(options(base_url.clone()), bus.clone())
            .with_transport(Arc::new(EchoTransport::default())),
    );
    server.connect().await.unwrap();

    let manager = SessionManager::from_config(server, &config(base_url), bus.clone());
    let orchestrator = NotebookOrchestrator::new(bus.clone());
    orchestrator.set_notebook(Arc::new(Notebook::new(
        "nb",
        vec![
            livecell_core::Cell::new(Some("one".into()), "1"),
            livecell_core::Cell::new(Some("two".into()), "2"),
        ],
        bus,
    )));
    Bridge::new(manager, orchestrator)
}

#[tokio::test]
async fn test_bridge_requires_session_before_execution() {
    let bridge = bridge().await;

    let reply = bridge
        .handle(ClientMessage::ExecuteAll { stop_on_error: true })
        .await;
    assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    assert!(!bridge.orchestrator().state().executing);
}

#[tokio::test]
async fn test_bridge_start_then_execute_subset() {
    let bridge = bridge().await;

    let reply = bridge.handle(ClientMessage::StartSession).await;
    let Some(ServerMessage::State { session, cells, .. }) = reply else {
        panic!("expected state");
    };
    assert!(session.ready);
    assert_eq!(cells.len(), 2);
    assert!(bridge.orchestrator().ready());

    assert!(
        bridge
            .handle(ClientMessage::EditCell {
                cell_id: "two".into(),
                source: "2 + 2".into(),
            })
            .await
            .is_none()
    );

    let reply = bridge
        .handle(ClientMessage::ExecuteCells {
            cell_ids: vec!["two".into()],
            stop_on_error: true,
        })
        .await;
    let Some(ServerMessage::ExecutionFinished { results }) = reply else {
        panic!("expected results");
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap().index, 1);

    let Some(ServerMessage::State { run, cells, .. }) = bridge.handle(ClientMessage::GetState).await else {
        panic!("expected state");
    };
    assert!(run.executed);
    assert_eq!(cells[1].source, "2 + 2");
    assert!(cells[0].result.is_none());
}

#[tokio::test]
async fn test_bridge_edit_unknown_cell() {
    let bridge = bridge().await;
    let reply = bridge
        .handle(ClientMessage::EditCell {
            cell_id: "missing".into(),
            source: String::new(),
        })
        .await;
    let Some(ServerMessage::Error { message }) = reply else {
        panic!("expected error");
    };
    assert!(message.contains("missing"));
}

#[tokio::test]
async fn test_attach_watcher_follows_auto_start() {
    let bridge = bridge().await;
    let watcher = bridge.spawn_attach_watcher();

    bridge.manager().start().await;
    for _ in 0..10 {
        if bridge.orchestrator().ready() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(bridge.orchestrator().ready());
    watcher.abort();
}
