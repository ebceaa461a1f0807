//! In-memory notebook model.
//!
//! A [`Notebook`] is an ordered list of [`Cell`]s (order is both execution and
//! display order) plus a one-way binding to a live [`KernelSession`]. The bulk
//! execution primitives here are what the orchestrator delegates to.
//!
//! # Execution
//!
//! ```text
//! Notebook::execute_all / execute_cells
//!     │
//!     ├── notebook "executing"
//!     │
//!     ├── for each selected cell, in notebook order
//!     │       ├── preprocessor(source)
//!     │       ├── Cell::execute ── Kernel::execute
//!     │       │       └── rejected → clear-on-error recovery
//!     │       └── failure + stop_on_error → remaining cells get `None`
//!     │
//!     └── notebook "completed" | "error"
//! ```

mod cell;
mod preprocess;
mod result;

pub use cell::{Cell, CellId};
pub use preprocess::{Preprocessor, magic_stripper, strip_magics};
pub use result::{CellOutput, ExecutionError, ExecutionResult};

use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::kernel::KernelSession;
use crate::status::{NotebookStatus, StatusBus, StatusMessage};

/// Ordered collection of cells plus session-attachment state.
pub struct Notebook {
    id: String,
    cells: Vec<Arc<Cell>>,
    session: OnceLock<Arc<dyn KernelSession>>,
    bus: StatusBus,
}

impl Notebook {
    /// Create a notebook from cells in display order.
    pub fn new(id: impl Into<String>, cells: Vec<Cell>, bus: StatusBus) -> Self {
        Self {
            id: id.into(),
            cells: cells.into_iter().map(Arc::new).collect(),
            session: OnceLock::new(),
            bus,
        }
    }

    /// Create a notebook with one cell per source, ids generated.
    pub fn from_sources<S: Into<String>>(
        id: impl Into<String>,
        sources: impl IntoIterator<Item = S>,
        bus: StatusBus,
    ) -> Self {
        let cells = sources.into_iter().map(|s| Cell::new(None, s)).collect();
        Self::new(id, cells, bus)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cells(&self) -> &[Arc<Cell>] {
        &self.cells
    }

    /// Cells flagged as widget cells, in notebook order.
    pub fn widgets(&self) -> Vec<Arc<Cell>> {
        self.cells.iter().filter(|c| c.is_widget()).cloned().collect()
    }

    pub fn cell_by_id(&self, id: &str) -> Option<Arc<Cell>> {
        self.cells.iter().find(|c| c.id().as_str() == id).cloned()
    }

    /// Bind the notebook to a session. Only the first call has an effect.
    ///
    /// Returns `true` if this call attached the notebook.
    pub fn attach_session(&self, session: Arc<dyn KernelSession>) -> bool {
        let session_id = session.id().to_string();
        let attached = self.session.set(session).is_ok();
        if attached {
            tracing::info!(notebook = %self.id, session = %session_id, "notebook attached");
        }
        attached
    }

    pub fn is_attached(&self) -> bool {
        self.session.get().is_some()
    }

    pub fn session(&self) -> Option<Arc<dyn KernelSession>> {
        self.session.get().cloned()
    }

    /// Run every cell in order.
    ///
    /// Returns one entry per cell; cells skipped because an earlier cell
    /// failed under `stop_on_error` are `None`.
    pub async fn execute_all(
        &self,
        stop_on_error: bool,
        preprocessor: Option<&Preprocessor>,
    ) -> Result<Vec<Option<ExecutionResult>>> {
        let selected: Vec<(usize, Arc<Cell>)> = self.cells.iter().cloned().enumerate().collect();
        self.run_batch(selected, stop_on_error, preprocessor).await
    }

    /// Run the cells with the given ids, in notebook order.
    ///
    /// Ids that do not name a cell are skipped. The returned list is
    /// restricted to the selected cells.
    pub async fn execute_cells(
        &self,
        ids: &[CellId],
        stop_on_error: bool,
        preprocessor: Option<&Preprocessor>,
    ) -> Result<Vec<Option<ExecutionResult>>> {
        for id in ids {
            if self.cell_by_id(id.as_str()).is_none() {
                tracing::warn!(notebook = %self.id, cell = %id, "skipping unknown cell");
            }
        }

        let selected: Vec<(usize, Arc<Cell>)> = self
            .cells
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, cell)| ids.contains(cell.id()))
            .collect();
        self.run_batch(selected, stop_on_error, preprocessor).await
    }

    async fn run_batch(
        &self,
        selected: Vec<(usize, Arc<Cell>)>,
        stop_on_error: bool,
        preprocessor: Option<&Preprocessor>,
    ) -> Result<Vec<Option<ExecutionResult>>> {
        let session = self.session.get().ok_or(Error::NotAttached)?;
        let kernel = session.kernel();

        self.bus.publish(StatusMessage::new(
            NotebookStatus::Executing,
            self.id.as_str(),
            format!("executing {} cells", selected.len()),
        ));

        let mut results = Vec::with_capacity(selected.len());
        let mut halted = false;

        for (index, cell) in selected {
            if halted {
                results.push(None);
                continue;
            }

            // Read the source as late as possible so edits made while earlier
            // cells ran are picked up
            let source = cell.source();
            let source = match preprocessor {
                Some(preprocess) => preprocess(&source),
                None => source,
            };

            let result = match cell.execute(kernel.as_ref(), &source, index, &self.bus).await {
                Ok(result) => result,
                Err(e) => cell.reject(&e, index, &self.bus),
            };

            if !result.success && stop_on_error {
                tracing::debug!(notebook = %self.id, cell = %cell.id(), "stopping after failed cell");
                halted = true;
            }
            results.push(Some(result));
        }

        let failed = results.iter().flatten().filter(|r| !r.success).count();
        let (status, message) = if failed == 0 {
            (NotebookStatus::Completed, "all cells completed".to_string())
        } else {
            (NotebookStatus::Error, format!("{} cell(s) failed", failed))
        };
        self.bus.publish(StatusMessage::new(status, self.id.as_str(), message));

        Ok(results)
    }

    /// Discard all outputs and results.
    pub fn clear(&self) {
        for cell in &self.cells {
            cell.clear();
        }
        self.bus.publish(StatusMessage::new(
            NotebookStatus::Changed,
            self.id.as_str(),
            "outputs cleared",
        ));
    }
}

impl std::fmt::Debug for Notebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notebook")
            .field("id", &self.id)
            .field("cells", &self.cells.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
