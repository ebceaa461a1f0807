//! Cell outputs and execution results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::cell::CellId;
use crate::error::Error;

/// One output produced by a cell run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum CellOutput {
    /// Text written to stdout or stderr.
    Stream { name: String, text: String },
    /// The value of the last expression, keyed by MIME type.
    ExecuteResult {
        data: serde_json::Value,
        #[serde(default)]
        execution_count: Option<u32>,
    },
    /// Rich output published explicitly by the code, keyed by MIME type.
    DisplayData { data: serde_json::Value },
}

impl CellOutput {
    /// Plain text stream output.
    pub fn stdout(text: impl Into<String>) -> Self {
        CellOutput::Stream {
            name: "stdout".to_string(),
            text: text.into(),
        }
    }

    /// `text/plain` execute result.
    pub fn text(text: impl Into<String>) -> Self {
        CellOutput::ExecuteResult {
            data: serde_json::json!({ "text/plain": text.into() }),
            execution_count: None,
        }
    }
}

/// Structured error raised while running a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Error class name (e.g. `ZeroDivisionError`).
    pub ename: String,
    /// Error message.
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl ExecutionError {
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: Vec::new(),
        }
    }

    /// Error recorded when the execute request itself was rejected.
    pub fn rejected(err: &Error) -> Self {
        Self::new("ExecutionRejected", err.to_string())
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ename, self.evalue)
    }
}

/// Outcome of one execution attempt of one cell.
///
/// Never mutated once created; a re-run replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Cell that was run.
    pub cell_id: CellId,
    /// Position of the cell in the notebook at the time of the run.
    pub index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn ok(cell_id: CellId, index: usize) -> Self {
        Self {
            cell_id,
            index,
            success: true,
            error: None,
        }
    }

    pub fn failed(cell_id: CellId, index: usize, error: ExecutionError) -> Self {
        Self {
            cell_id,
            index,
            success: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tagging() {
        let json = serde_json::to_value(CellOutput::stdout("hi\n")).unwrap();
        assert_eq!(json["output_type"], "stream");
        assert_eq!(json["name"], "stdout");

        let json = serde_json::to_value(CellOutput::text("42")).unwrap();
        assert_eq!(json["output_type"], "execute_result");
        assert_eq!(json["data"]["text/plain"], "42");
    }

    #[test]
    fn test_rejected_error_keeps_cause() {
        let err = ExecutionError::rejected(&Error::Kernel("socket closed".into()));
        assert_eq!(err.ename, "ExecutionRejected");
        assert!(err.evalue.contains("socket closed"));
    }

    #[test]
    fn test_successful_result_omits_error() {
        let result = ExecutionResult::ok(CellId::new("a"), 0);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["success"], true);
    }
}
