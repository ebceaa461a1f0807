//! Integration tests for protocol message serialization.
//!
//! Pins the JSON shape page-side clients rely on.

use livecell_core::{
    CellStatus, ExecutionError, ExecutionResult, RunState, SessionState, StatusMessage,
};
use livecell_server::protocol::*;
use serde_json::json;

#[test]
fn test_client_messages_parse() {
    let cases = [
        (json!({"type": "get_state"}), ClientMessage::GetState),
        (json!({"type": "start_session"}), ClientMessage::StartSession),
        (json!({"type": "restart_session"}), ClientMessage::RestartSession),
        (json!({"type": "shutdown_session"}), ClientMessage::ShutdownSession),
        (json!({"type": "clear"}), ClientMessage::Clear),
        (
            json!({"type": "execute_all", "stop_on_error": false}),
            ClientMessage::ExecuteAll { stop_on_error: false },
        ),
        (
            json!({"type": "edit_cell", "cell_id": "c1", "source": "x = 1"}),
            ClientMessage::EditCell {
                cell_id: "c1".into(),
                source: "x = 1".into(),
            },
        ),
    ];

    for (json, expected) in cases {
        let parsed: ClientMessage = serde_json::from_value(json.clone())
            .unwrap_or_else(|e| panic!("failed to parse {}: {}", json, e));
        assert_eq!(parsed, expected);
    }
}

#[test]
fn test_stop_on_error_defaults_to_true() {
    let msg: ClientMessage = serde_json::from_value(json!({"type": "execute_all"})).unwrap();
    assert_eq!(msg, ClientMessage::ExecuteAll { stop_on_error: true });

    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "execute_cells", "cell_ids": ["a", "c"]})).unwrap();
    assert_eq!(
        msg,
        ClientMessage::ExecuteCells {
            cell_ids: vec!["a".into(), "c".into()],
            stop_on_error: true,
        }
    );
}

#[test]
fn test_unknown_client_message_rejected() {
    assert!(serde_json::from_value::<ClientMessage>(json!({"type": "interrupt"})).is_err());
}

#[test]
fn test_remote_messages() {
    assert!(ClientMessage::StartSession.is_remote());
    assert!(ClientMessage::ShutdownSession.is_remote());
    assert!(!ClientMessage::Clear.is_remote());
    assert!(ClientMessage::ExecuteAll { stop_on_error: true }.is_remote());
    assert!(!ClientMessage::GetState.is_remote());
    assert!(
        !ClientMessage::EditCell {
            cell_id: "c".into(),
            source: String::new()
        }
        .is_remote()
    );
}

#[test]
fn test_status_message_is_flattened() {
    let msg = ServerMessage::Status(StatusMessage::new(CellStatus::Executing, "c1", "executing"));
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        json,
        json!({
            "type": "status",
            "subject": "cell",
            "status": "executing",
            "id": "c1",
            "message": "executing"
        })
    );
}

#[test]
fn test_execution_finished_keeps_skipped_cells() {
    let msg = ServerMessage::ExecutionFinished {
        results: vec![
            Some(ExecutionResult::ok("a".into(), 0)),
            Some(ExecutionResult::failed(
                "b".into(),
                1,
                ExecutionError::new("ValueError", "boom"),
            )),
            None,
        ],
    };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "execution_finished");
    assert_eq!(json["results"][0], json!({"cell_id": "a", "index": 0, "success": true}));
    assert_eq!(json["results"][1]["error"]["ename"], "ValueError");
    assert!(json["results"][2].is_null());
}

#[test]
fn test_state_snapshot_shape() {
    let msg = ServerMessage::State {
        session: SessionState {
            ready: true,
            session_id: Some("s-1".into()),
            ..Default::default()
        },
        run: RunState::default(),
        cells: Vec::new(),
    };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "state");
    assert_eq!(json["session"]["ready"], true);
    assert_eq!(json["session"]["session_id"], "s-1");
    assert_eq!(json["run"], json!({"executing": false, "executed": false, "errors": null}));
}
