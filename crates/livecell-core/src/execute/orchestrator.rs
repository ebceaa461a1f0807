//! Aggregate run state and bulk execution over one notebook.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::ExecuteOptions;
use crate::dom::BusyIndicator;
use crate::error::{Error, Result};
use crate::kernel::KernelSession;
use crate::notebook::{Cell, CellId, ExecutionResult, Notebook};
use crate::status::StatusBus;

/// Observable run state of an orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// A run is in flight. Advisory only; runs are not serialized.
    pub executing: bool,
    /// A run has completed since the last `clear`.
    pub executed: bool,
    /// Failed results of the last run, in notebook order. Never empty.
    pub errors: Option<Vec<ExecutionResult>>,
}

#[derive(Default)]
struct Slots {
    notebook: Option<Arc<Notebook>>,
    session: Option<Arc<dyn KernelSession>>,
    run: RunState,
}

/// Runs cells of the attached notebook and tracks aggregate run state.
///
/// Every operation except [`ready`](Self::ready) and [`state`](Self::state)
/// requires a notebook; calling one before [`set_notebook`](Self::set_notebook)
/// returns [`Error::NotebookNotSet`].
#[derive(Clone)]
pub struct NotebookOrchestrator {
    slots: Arc<Mutex<Slots>>,
    busy: Option<Arc<BusyIndicator>>,
    bus: StatusBus,
}

impl NotebookOrchestrator {
    pub fn new(bus: StatusBus) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            busy: None,
            bus,
        }
    }

    /// Flag each selected cell busy while a run is in flight.
    pub fn with_busy_indicator(mut self, busy: Arc<BusyIndicator>) -> Self {
        self.busy = Some(busy);
        self
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    /// Set the notebook to orchestrate, binding it to the session if one is
    /// already available.
    pub fn set_notebook(&self, notebook: Arc<Notebook>) {
        let mut slots = self.slots();
        if slots.notebook.is_some() {
            tracing::debug!(notebook = %notebook.id(), "replacing orchestrated notebook");
        }
        slots.notebook = Some(notebook);
        Self::try_attach(&slots);
    }

    /// Offer the current session. The notebook is bound once, when both are
    /// present and the session is ready; later sessions are not rebound.
    pub fn set_session(&self, session: Option<Arc<dyn KernelSession>>) {
        let mut slots = self.slots();
        slots.session = session;
        Self::try_attach(&slots);
    }

    fn try_attach(slots: &Slots) {
        let (Some(notebook), Some(session)) = (&slots.notebook, &slots.session) else {
            return;
        };
        if notebook.is_attached() || !session.is_ready() {
            return;
        }
        notebook.attach_session(session.clone());
    }

    /// The notebook is attached to a session and can run cells.
    pub fn ready(&self) -> bool {
        self.slots()
            .notebook
            .as_ref()
            .is_some_and(|nb| nb.is_attached())
    }

    pub fn notebook(&self) -> Result<Arc<Notebook>> {
        self.slots().notebook.clone().ok_or(Error::NotebookNotSet)
    }

    pub fn state(&self) -> RunState {
        self.slots().run.clone()
    }

    pub fn is_executing(&self) -> bool {
        self.slots().run.executing
    }

    /// Run every cell in notebook order.
    ///
    /// Returns one entry per cell; cells skipped under `stop_on_error` are
    /// `None`.
    pub async fn execute_all(&self, options: ExecuteOptions) -> Result<Vec<Option<ExecutionResult>>> {
        let notebook = self.notebook()?;
        let selected: Vec<CellId> = notebook.cells().iter().map(|c| c.id().clone()).collect();

        self.run(&notebook, &selected, &options, || {
            notebook.execute_all(options.stop_on_error, options.preprocessor.as_ref())
        })
        .await
    }

    /// Run the cells matching `predicate`, in notebook order.
    ///
    /// The predicate is evaluated once against every cell before anything is
    /// dispatched. The returned list covers only the selected cells.
    pub async fn execute_some<F>(
        &self,
        predicate: F,
        options: ExecuteOptions,
    ) -> Result<Vec<Option<ExecutionResult>>>
    where
        F: Fn(&Cell) -> bool,
    {
        let notebook = self.notebook()?;
        let selected: Vec<CellId> = notebook
            .cells()
            .iter()
            .filter(|c| predicate(c))
            .map(|c| c.id().clone())
            .collect();

        self.run(&notebook, &selected, &options, || {
            notebook.execute_cells(&selected, options.stop_on_error, options.preprocessor.as_ref())
        })
        .await
    }

    async fn run<F, Fut>(
        &self,
        notebook: &Notebook,
        selected: &[CellId],
        options: &ExecuteOptions,
        dispatch: F,
    ) -> Result<Vec<Option<ExecutionResult>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Option<ExecutionResult>>>>,
    {
        if let Some(before) = &options.before {
            before();
        }

        {
            let mut slots = self.slots();
            if slots.run.executing {
                tracing::warn!(notebook = %notebook.id(), "run requested while another run is executing");
            }
            slots.run.executing = true;
        }
        tracing::debug!(notebook = %notebook.id(), cells = selected.len(), "run started");

        if let Some(busy) = &self.busy {
            for id in selected {
                busy.set_buttons_busy(id.as_str());
            }
        }

        let outcome = dispatch().await;

        if let Some(busy) = &self.busy {
            for id in selected {
                busy.clear_buttons_busy(id.as_str());
            }
        }

        if let Some(after) = &options.after {
            after();
        }

        let mut slots = self.slots();
        match &outcome {
            Ok(results) => {
                slots.run.errors = collect_errors(results);
                slots.run.executed = true;
                if let Some(errors) = &slots.run.errors {
                    tracing::info!(notebook = %notebook.id(), failed = errors.len(), "run finished with errors");
                } else {
                    tracing::info!(notebook = %notebook.id(), "run finished");
                }
            }
            Err(e) => {
                tracing::warn!(notebook = %notebook.id(), "run could not start: {}", e);
            }
        }
        slots.run.executing = false;

        outcome
    }

    /// Discard outputs and reset `executed`. `errors` keeps the last run's
    /// failures until the next run overwrites them.
    pub fn clear(&self) -> Result<()> {
        let notebook = self.notebook()?;
        notebook.clear();
        self.slots().run.executed = false;
        Ok(())
    }
}

impl std::fmt::Debug for NotebookOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots();
        f.debug_struct("NotebookOrchestrator")
            .field("notebook", &slots.notebook.as_ref().map(|nb| nb.id().to_string()))
            .field("session", &slots.session.as_ref().map(|s| s.id().to_string()))
            .field("run", &slots.run)
            .finish()
    }
}

/// Keep the failed entries of a result list, in order.
///
/// Returns `None` rather than an empty list when nothing failed.
pub fn collect_errors(results: &[Option<ExecutionResult>]) -> Option<Vec<ExecutionResult>> {
    let errors: Vec<ExecutionResult> = results
        .iter()
        .flatten()
        .filter(|r| r.error.is_some())
        .cloned()
        .collect();
    (!errors.is_empty()).then_some(errors)
}
