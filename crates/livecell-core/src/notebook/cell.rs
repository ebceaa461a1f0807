//! A single executable cell.

use std::fmt;
use std::sync::{Mutex, MutexGuard, OnceLock};

use serde::{Deserialize, Serialize};

use super::result::{CellOutput, ExecutionError, ExecutionResult};
use crate::dom::ElementId;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::status::{CellStatus, StatusBus, StatusMessage};

/// Stable identifier of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier for a cell whose source carries none.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CellId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Default)]
struct CellState {
    source: String,
    status: CellStatus,
    outputs: Vec<CellOutput>,
    result: Option<ExecutionResult>,
}

/// One unit of source code plus its latest execution result.
///
/// Cells are shared between the notebook, the binder and the UI, so all
/// mutable state sits behind a lock that is never held across an await.
#[derive(Debug)]
pub struct Cell {
    id: CellId,
    widget: bool,
    state: Mutex<CellState>,
    /// Output target, set at most once.
    element: OnceLock<ElementId>,
}

impl Cell {
    /// Create a cell. A missing id is generated.
    pub fn new(id: Option<CellId>, source: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(CellId::generate),
            widget: false,
            state: Mutex::new(CellState {
                source: source.into(),
                ..Default::default()
            }),
            element: OnceLock::new(),
        }
    }

    /// Flag the cell as a widget cell (interactive output that needs its own
    /// DOM attachment).
    pub fn with_widget(mut self, widget: bool) -> Self {
        self.widget = widget;
        self
    }

    pub fn id(&self) -> &CellId {
        &self.id
    }

    pub fn is_widget(&self) -> bool {
        self.widget
    }

    fn state(&self) -> MutexGuard<'_, CellState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current source text.
    pub fn source(&self) -> String {
        self.state().source.clone()
    }

    /// Replace the source. Editing never triggers a run.
    pub fn set_source(&self, source: impl Into<String>) {
        let mut state = self.state();
        state.source = source.into();
        state.status = CellStatus::Changed;
    }

    pub fn status(&self) -> CellStatus {
        self.state().status
    }

    pub fn outputs(&self) -> Vec<CellOutput> {
        self.state().outputs.clone()
    }

    /// Result of the most recent run, if any.
    pub fn last_result(&self) -> Option<ExecutionResult> {
        self.state().result.clone()
    }

    /// Bind the cell's output target. Only the first call has an effect.
    ///
    /// Returns `true` if this call attached the cell.
    pub fn attach_to_dom(&self, element: ElementId) -> bool {
        self.element.set(element).is_ok()
    }

    /// Element the cell's output is attached to.
    pub fn element(&self) -> Option<ElementId> {
        self.element.get().copied()
    }

    /// Discard outputs and the last result.
    pub fn clear(&self) {
        let mut state = self.state();
        state.outputs.clear();
        state.result = None;
        state.status = CellStatus::Changed;
    }

    /// Recovery after a rejected execute request: drop whatever partial
    /// output is showing and mark the cell failed.
    pub(crate) fn clear_on_error(&self, err: &Error, bus: &StatusBus) {
        {
            let mut state = self.state();
            state.outputs.clear();
            state.status = CellStatus::Error;
        }
        tracing::warn!(cell = %self.id, "execution rejected: {}", err);
        bus.publish(StatusMessage::new(
            CellStatus::Error,
            self.id.as_str(),
            err.to_string(),
        ));
    }

    /// Record a result that did not come from [`Cell::execute`].
    pub(crate) fn record_result(&self, result: ExecutionResult) {
        self.state().result = Some(result);
    }

    /// Send `source` to the kernel and record the outcome.
    ///
    /// `index` is the cell's position in its notebook. A rejected request is
    /// returned as `Err` without touching the cell; the caller decides how to
    /// recover.
    pub async fn execute(
        &self,
        kernel: &dyn Kernel,
        source: &str,
        index: usize,
        bus: &StatusBus,
    ) -> Result<ExecutionResult> {
        self.state().status = CellStatus::Executing;
        bus.publish(StatusMessage::new(
            CellStatus::Executing,
            self.id.as_str(),
            "executing",
        ));

        let reply = kernel.execute(source).await?;

        let (result, status, message) = match reply.error {
            None => (
                ExecutionResult::ok(self.id.clone(), index),
                CellStatus::Completed,
                "completed".to_string(),
            ),
            Some(error) => {
                let message = error.to_string();
                (
                    ExecutionResult::failed(self.id.clone(), index, error),
                    CellStatus::Error,
                    message,
                )
            }
        };

        {
            let mut state = self.state();
            state.outputs = reply.outputs;
            state.result = Some(result.clone());
            state.status = status;
        }
        bus.publish(StatusMessage::new(status, self.id.as_str(), message));

        Ok(result)
    }

    /// Convert a rejection into a failed result, applying the error recovery.
    pub(crate) fn reject(&self, err: &Error, index: usize, bus: &StatusBus) -> ExecutionResult {
        self.clear_on_error(err, bus);
        let result = ExecutionResult::failed(self.id.clone(), index, ExecutionError::rejected(err));
        self.record_result(result.clone());
        result
    }
}
