//! Error types for livecell server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// livecell core error.
    #[error("Core error: {0}")]
    Core(#[from] livecell_core::Error),

    /// HTTP request to the compute server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The compute server answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The compute server never became ready.
    #[error("compute server at {url} unreachable after {attempts} attempts")]
    Unreachable { url: String, attempts: u32 },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid listen address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<ServerError> for livecell_core::Error {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Core(inner) => inner,
            other => livecell_core::Error::Server(other.to_string()),
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
