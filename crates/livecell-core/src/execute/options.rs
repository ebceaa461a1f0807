//! Per-run execution options.

use std::sync::Arc;

use crate::notebook::Preprocessor;

/// Callback invoked around a run.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Options for [`NotebookOrchestrator::execute_all`] and
/// [`NotebookOrchestrator::execute_some`].
///
/// [`NotebookOrchestrator::execute_all`]: super::NotebookOrchestrator::execute_all
/// [`NotebookOrchestrator::execute_some`]: super::NotebookOrchestrator::execute_some
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Halt the batch at the first failing cell.
    pub stop_on_error: bool,
    /// Source transform applied right before each cell is sent.
    pub preprocessor: Option<Preprocessor>,
    /// Runs before `executing` is set.
    pub before: Option<Hook>,
    /// Runs after the batch, whether or not cells failed.
    pub after: Option<Hook>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            preprocessor: None,
            before: None,
            after: None,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn before(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("stop_on_error", &self.stop_on_error)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
