//! Status enumerations for the five actor kinds and the message envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of the remote compute server connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// The connection is being established.
    Launching,
    /// The server answered and accepts session requests.
    Ready,
    /// The connection was closed by this side.
    Closed,
    /// The server could not be reached.
    Failed,
    /// Nothing is known yet.
    #[default]
    Unknown,
}

/// Status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Ready,
    Dead,
}

/// Status of the remote kernel behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelStatus {
    Starting,
    Ready,
    Dead,
}

/// Aggregate status of a notebook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotebookStatus {
    /// Sources or outputs changed since the last run.
    #[default]
    Changed,
    /// A batch run is in flight.
    Executing,
    /// The last batch run finished without errors.
    Completed,
    /// The last batch run recorded at least one failing cell.
    Error,
}

/// Status of a single cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// The source was edited (or never run).
    #[default]
    Changed,
    /// The cell is running on the kernel.
    Executing,
    /// The last run succeeded.
    Completed,
    /// The last run failed.
    Error,
}

/// The actor kind a status message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Server,
    Session,
    Kernel,
    Notebook,
    Cell,
}

/// A status value tagged with its subject.
///
/// The tag is the subject, so a status can never be paired with the
/// enumeration of another actor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "subject", content = "status", rename_all = "snake_case")]
pub enum Status {
    Server(ServerStatus),
    Session(SessionStatus),
    Kernel(KernelStatus),
    Notebook(NotebookStatus),
    Cell(CellStatus),
}

impl Status {
    /// The actor kind this status belongs to.
    pub fn subject(&self) -> Subject {
        match self {
            Status::Server(_) => Subject::Server,
            Status::Session(_) => Subject::Session,
            Status::Kernel(_) => Subject::Kernel,
            Status::Notebook(_) => Subject::Notebook,
            Status::Cell(_) => Subject::Cell,
        }
    }
}

impl From<ServerStatus> for Status {
    fn from(s: ServerStatus) -> Self {
        Status::Server(s)
    }
}

impl From<SessionStatus> for Status {
    fn from(s: SessionStatus) -> Self {
        Status::Session(s)
    }
}

impl From<KernelStatus> for Status {
    fn from(s: KernelStatus) -> Self {
        Status::Kernel(s)
    }
}

impl From<NotebookStatus> for Status {
    fn from(s: NotebookStatus) -> Self {
        Status::Notebook(s)
    }
}

impl From<CellStatus> for Status {
    fn from(s: CellStatus) -> Self {
        Status::Cell(s)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Subject::Server => "server",
            Subject::Session => "session",
            Subject::Kernel => "kernel",
            Subject::Notebook => "notebook",
            Subject::Cell => "cell",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Server(s) => match s {
                ServerStatus::Launching => "launching",
                ServerStatus::Ready => "ready",
                ServerStatus::Closed => "closed",
                ServerStatus::Failed => "failed",
                ServerStatus::Unknown => "unknown",
            },
            Status::Session(SessionStatus::Starting) | Status::Kernel(KernelStatus::Starting) => {
                "starting"
            }
            Status::Session(SessionStatus::Ready) | Status::Kernel(KernelStatus::Ready) => "ready",
            Status::Session(SessionStatus::Dead) | Status::Kernel(KernelStatus::Dead) => "dead",
            Status::Notebook(NotebookStatus::Changed) | Status::Cell(CellStatus::Changed) => {
                "changed"
            }
            Status::Notebook(NotebookStatus::Executing) | Status::Cell(CellStatus::Executing) => {
                "executing"
            }
            Status::Notebook(NotebookStatus::Completed) | Status::Cell(CellStatus::Completed) => {
                "completed"
            }
            Status::Notebook(NotebookStatus::Error) | Status::Cell(CellStatus::Error) => "error",
        };
        f.write_str(s)
    }
}

/// A status-change message.
///
/// `id` is absent for process-wide actors such as the server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl StatusMessage {
    /// Create a message about a specific actor.
    pub fn new(status: impl Into<Status>, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            id: Some(id.into()),
            message: message.into(),
        }
    }

    /// Create a message about a process-wide actor.
    pub fn global(status: impl Into<Status>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            id: None,
            message: message.into(),
        }
    }

    pub fn subject(&self) -> Subject {
        self.status.subject()
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "[{} {}] {}: {}", self.subject(), id, self.status, self.message),
            None => write!(f, "[{}] {}: {}", self.subject(), self.status, self.message),
        }
    }
}
