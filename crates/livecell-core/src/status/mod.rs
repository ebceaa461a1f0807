//! Status taxonomy shared by every actor.
//!
//! Five closed status sets (server, session, kernel, notebook, cell), a
//! uniform [`StatusMessage`] envelope and the [`StatusBus`] registry used to
//! report transitions.

mod bus;
mod types;

pub use bus::{StatusBus, StatusCallback, Subscription};
pub use types::{
    CellStatus, KernelStatus, NotebookStatus, ServerStatus, SessionStatus, Status, StatusMessage,
    Subject,
};
