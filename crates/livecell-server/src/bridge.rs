//! Dispatch of client commands onto the session manager and orchestrator.

use livecell_core::{
    ExecuteOptions, NotebookOrchestrator, Preprocessor, SessionManager, SessionStatus, Status,
    StatusBus,
};
use tokio::task::JoinHandle;

use crate::protocol::{CellSnapshot, ClientMessage, ServerMessage};

/// One notebook, one session slot, shared by every connected client.
#[derive(Clone)]
pub struct Bridge {
    manager: SessionManager,
    orchestrator: NotebookOrchestrator,
    preprocessor: Option<Preprocessor>,
}

impl Bridge {
    pub fn new(manager: SessionManager, orchestrator: NotebookOrchestrator) -> Self {
        Self {
            manager,
            orchestrator,
            preprocessor: None,
        }
    }

    /// Apply `preprocessor` to every cell source before it is sent.
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn orchestrator(&self) -> &NotebookOrchestrator {
        &self.orchestrator
    }

    pub fn bus(&self) -> &StatusBus {
        self.orchestrator.bus()
    }

    /// Full state snapshot.
    pub fn snapshot(&self) -> ServerMessage {
        let cells = self
            .orchestrator
            .notebook()
            .map(|nb| nb.cells().iter().map(|c| CellSnapshot::from(c.as_ref())).collect())
            .unwrap_or_default();
        ServerMessage::State {
            session: self.manager.state(),
            run: self.orchestrator.state(),
            cells,
        }
    }

    /// Offer the manager's current session to the orchestrator.
    pub fn sync_session(&self) {
        self.orchestrator.set_session(self.manager.session());
    }

    /// Keep the orchestrator's session in step with sessions that become
    /// ready without a client asking (auto-start).
    pub fn spawn_attach_watcher(&self) -> JoinHandle<()> {
        let bridge = self.clone();
        let (subscription, mut rx) = self.bus().subscribe_channel();

        tokio::spawn(async move {
            let _subscription = subscription;
            while let Some(msg) = rx.recv().await {
                if msg.status == Status::Session(SessionStatus::Ready) {
                    bridge.sync_session();
                }
            }
        })
    }

    fn options(&self, stop_on_error: bool) -> ExecuteOptions {
        let options = ExecuteOptions::new().stop_on_error(stop_on_error);
        match &self.preprocessor {
            Some(preprocessor) => options.preprocessor(preprocessor.clone()),
            None => options,
        }
    }

    /// Serve one client message. Returns the reply, if any.
    pub async fn handle(&self, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::GetState => Some(self.snapshot()),

            ClientMessage::StartSession => {
                self.manager.start().await;
                self.sync_session();
                Some(self.snapshot())
            }

            ClientMessage::RestartSession => {
                self.manager.restart().await;
                self.sync_session();
                Some(self.snapshot())
            }

            ClientMessage::ShutdownSession => {
                self.manager.shutdown().await;
                Some(self.snapshot())
            }

            ClientMessage::ExecuteAll { stop_on_error } => {
                let outcome = self
                    .orchestrator
                    .execute_all(self.options(stop_on_error))
                    .await;
                Some(finished(outcome))
            }

            ClientMessage::ExecuteCells {
                cell_ids,
                stop_on_error,
            } => {
                let outcome = self
                    .orchestrator
                    .execute_some(|cell| cell_ids.contains(cell.id()), self.options(stop_on_error))
                    .await;
                Some(finished(outcome))
            }

            ClientMessage::Clear => match self.orchestrator.clear() {
                Ok(()) => Some(self.snapshot()),
                Err(e) => Some(error(e)),
            },

            ClientMessage::EditCell { cell_id, source } => {
                let cell = self
                    .orchestrator
                    .notebook()
                    .and_then(|nb| {
                        nb.cell_by_id(cell_id.as_str())
                            .ok_or_else(|| livecell_core::Error::CellNotFound(cell_id.to_string()))
                    });
                match cell {
                    Ok(cell) => {
                        cell.set_source(source);
                        None
                    }
                    Err(e) => Some(error(e)),
                }
            }
        }
    }
}

fn finished(outcome: livecell_core::Result<Vec<Option<livecell_core::ExecutionResult>>>) -> ServerMessage {
    match outcome {
        Ok(results) => ServerMessage::ExecutionFinished { results },
        Err(e) => error(e),
    }
}

fn error(e: livecell_core::Error) -> ServerMessage {
    tracing::warn!("request failed: {}", e);
    ServerMessage::Error {
        message: e.to_string(),
    }
}
