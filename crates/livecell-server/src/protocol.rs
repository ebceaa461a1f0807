//! WebSocket protocol messages for the livecell bridge.
//!
//! Defines the message types exchanged between page-side clients and the
//! bridge.

use serde::{Deserialize, Serialize};

use livecell_core::{
    Cell, CellId, CellOutput, CellStatus, ExecutionResult, RunState, SessionState, StatusMessage,
};

fn default_stop_on_error() -> bool {
    true
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the current session, run and cell state.
    GetState,

    /// Start a session, or restart the live one.
    StartSession,

    /// Restart the live session's kernel.
    RestartSession,

    /// Shut the live session down.
    ShutdownSession,

    /// Execute every cell.
    ExecuteAll {
        #[serde(default = "default_stop_on_error")]
        stop_on_error: bool,
    },

    /// Execute the given cells, in notebook order.
    ExecuteCells {
        cell_ids: Vec<CellId>,
        #[serde(default = "default_stop_on_error")]
        stop_on_error: bool,
    },

    /// Discard all outputs and results.
    Clear,

    /// Replace a cell's source. Does not run the cell.
    EditCell {
        cell_id: CellId,
        source: String,
    },
}

impl ClientMessage {
    /// Whether handling the message waits on the compute server.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ClientMessage::StartSession
                | ClientMessage::RestartSession
                | ClientMessage::ShutdownSession
                | ClientMessage::ExecuteAll { .. }
                | ClientMessage::ExecuteCells { .. }
        )
    }
}

/// Client-facing view of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: CellId,
    pub source: String,
    pub status: CellStatus,
    pub widget: bool,
    pub outputs: Vec<CellOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl From<&Cell> for CellSnapshot {
    fn from(cell: &Cell) -> Self {
        Self {
            id: cell.id().clone(),
            source: cell.source(),
            status: cell.status(),
            widget: cell.is_widget(),
            outputs: cell.outputs(),
            result: cell.last_result(),
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state snapshot.
    State {
        session: SessionState,
        run: RunState,
        cells: Vec<CellSnapshot>,
    },

    /// A status transition of any actor.
    Status(StatusMessage),

    /// A bulk run finished. Skipped cells are `null`.
    ExecutionFinished {
        results: Vec<Option<ExecutionResult>>,
    },

    /// A request could not be served.
    Error { message: String },
}
