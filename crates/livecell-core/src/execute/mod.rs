//! Notebook execution orchestration.
//!
//! The [`NotebookOrchestrator`] sequences bulk runs over an attached
//! notebook and keeps the aggregate run state (`executing`, `executed`,
//! `errors`) that UI layers observe.

mod options;
mod orchestrator;

pub use options::{ExecuteOptions, Hook};
pub use orchestrator::{NotebookOrchestrator, RunState, collect_errors};
