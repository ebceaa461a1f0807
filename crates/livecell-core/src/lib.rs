//! Execution orchestration core for live code cells embedded in web pages.
//!
//! This crate provides:
//! - Status taxonomy and a subscriber registry for status messages
//! - Collaborator contracts for compute servers, sessions and kernels
//! - In-memory notebook and cell model
//! - Session lifecycle management with auto-start and restart coalescing
//! - Notebook execution orchestration (stop-on-error, error collection)
//! - Busy-indicator protocol and DOM attachment over an abstract document

pub mod config;
pub mod dom;
pub mod error;
pub mod execute;
pub mod kernel;
pub mod notebook;
pub mod session;
pub mod status;

pub use config::{BusyOptions, Config, KernelOptions, ServerOptions, SessionOptions};
pub use dom::{BusyIndicator, Document, DomBinder, ElementId, ElementSpec, Placeholder, VirtualDom};
pub use error::{Error, Result};
pub use execute::{ExecuteOptions, Hook, NotebookOrchestrator, RunState, collect_errors};
pub use kernel::{
    ComputeServer, Kernel, KernelReply, KernelSession, KernelSpec, KernelSpecInfo, KernelSpecs,
    SessionRequest,
};
pub use notebook::{
    Cell, CellId, CellOutput, ExecutionError, ExecutionResult, Notebook, Preprocessor,
    magic_stripper, strip_magics,
};
pub use session::{SessionManager, SessionScope, SessionState};
pub use status::{
    CellStatus, KernelStatus, NotebookStatus, ServerStatus, SessionStatus, Status, StatusBus,
    StatusCallback, StatusMessage, Subject, Subscription,
};
