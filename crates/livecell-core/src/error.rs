//! Error types for livecell-core.

use thiserror::Error;

/// Result type for livecell-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in livecell-core.
#[derive(Debug, Error)]
pub enum Error {
    /// An orchestrator operation was invoked before a notebook was set.
    ///
    /// This is a caller bug, not an environmental condition.
    #[error("no notebook has been set on the orchestrator")]
    NotebookNotSet,

    /// The notebook has no session attached, so cells have nowhere to run.
    #[error("notebook is not attached to a session")]
    NotAttached,

    /// Cell not found.
    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// The remote kernel rejected or failed a request.
    #[error("kernel error: {0}")]
    Kernel(String),

    /// The compute server rejected or failed a request.
    #[error("server error: {0}")]
    Server(String),

    /// No kernel message transport is configured for execution.
    #[error("no kernel transport configured for execution")]
    TransportUnavailable,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
