//! Start/restart/shutdown state machine for one session slot.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::{Config, KernelOptions, SessionOptions};
use crate::kernel::{ComputeServer, KernelSession, SessionRequest};
use crate::status::{KernelStatus, SessionStatus, StatusBus, StatusMessage};

/// Observable snapshot of a [`SessionManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// A start is in flight, or is waiting for the server to become ready
    /// with auto-start enabled.
    pub starting: bool,
    /// A restart is being serviced.
    pub restarting: bool,
    /// A session is live.
    pub ready: bool,
    /// Server-assigned id of the live session.
    pub session_id: Option<String>,
    /// Why the last start or restart failed.
    pub error: Option<String>,
}

#[derive(Default)]
struct LifecycleState {
    starting: bool,
    /// A start request is talking to the server.
    start_in_flight: bool,
    restarting: bool,
    /// A restart was requested while another was being serviced.
    restart_pending: bool,
    ready: bool,
    session: Option<Arc<dyn KernelSession>>,
    error: Option<String>,
}

struct ManagerInner {
    server: Arc<dyn ComputeServer>,
    kernel: KernelOptions,
    options: SessionOptions,
    bus: StatusBus,
    state: Mutex<LifecycleState>,
}

/// Owns the lifecycle of one session bound to one compute server connection.
///
/// Failures never surface as `Err`: they are recorded in
/// [`SessionState::error`] and the caller decides whether to call
/// [`start`](Self::start) again.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Create a manager. With `auto_start` enabled the manager begins with a
    /// pending start request, serviced by [`spawn_auto_start`](Self::spawn_auto_start).
    pub fn new(
        server: Arc<dyn ComputeServer>,
        kernel: KernelOptions,
        options: SessionOptions,
        bus: StatusBus,
    ) -> Self {
        let state = LifecycleState {
            starting: options.auto_start,
            ..Default::default()
        };
        Self {
            inner: Arc::new(ManagerInner {
                server,
                kernel,
                options,
                bus,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn from_config(server: Arc<dyn ComputeServer>, config: &Config, bus: StatusBus) -> Self {
        Self::new(server, config.kernel.clone(), config.session.clone(), bus)
    }

    fn state_mut(&self) -> MutexGuard<'_, LifecycleState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Logical session slot.
    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn state(&self) -> SessionState {
        let state = self.state_mut();
        SessionState {
            starting: state.starting,
            restarting: state.restarting,
            ready: state.ready,
            session_id: state.session.as_ref().map(|s| s.id().to_string()),
            error: state.error.clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state_mut().ready
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<Arc<dyn KernelSession>> {
        self.state_mut().session.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state_mut().error.clone()
    }

    fn publish_session(&self, status: SessionStatus, message: impl Into<String>) {
        self.inner
            .bus
            .publish(StatusMessage::new(status, self.name(), message));
    }

    /// Start a session, or restart the live one.
    ///
    /// When the server is not ready yet and `auto_start` is enabled, the
    /// request is recorded (`starting` stays set) and serviced by the
    /// auto-start watcher. Without `auto_start` nothing would service it, so
    /// `starting` is cleared and the reason is recorded in `error`.
    pub async fn start(&self) {
        let live = {
            let state = self.state_mut();
            if state.ready { state.session.clone() } else { None }
        };
        if live.is_some() {
            tracing::info!(session = %self.name(), "session already running, restarting instead");
            self.restart().await;
            return;
        }

        {
            let mut state = self.state_mut();
            state.starting = true;
            if state.start_in_flight {
                tracing::debug!(session = %self.name(), "start already in flight");
                return;
            }
            if !self.inner.server.is_ready() {
                if self.inner.options.auto_start {
                    tracing::debug!(session = %self.name(), "server not ready, start deferred");
                } else {
                    tracing::warn!(session = %self.name(), "server not ready, start dropped");
                    state.starting = false;
                    state.error = Some("compute server is not ready".to_string());
                }
                return;
            }
            state.start_in_flight = true;
            state.error = None;
        }

        self.publish_session(SessionStatus::Starting, "requesting session");

        let request = SessionRequest::for_slot(self.name(), &self.inner.kernel.name);
        let outcome = self.inner.server.start_new_session(request).await;

        match outcome {
            Ok(Some(session)) => {
                let session_id = session.id().to_string();
                {
                    let mut state = self.state_mut();
                    state.session = Some(session);
                    state.ready = true;
                    state.starting = false;
                    state.start_in_flight = false;
                }
                tracing::info!(session = %self.name(), id = %session_id, "session started");
                self.publish_session(SessionStatus::Ready, format!("session {} ready", session_id));
            }
            Ok(None) => {
                let message = self.no_kernel_message().await;
                tracing::warn!(session = %self.name(), "{}", message);
                self.fail_start(message);
            }
            Err(e) => {
                tracing::warn!(session = %self.name(), "session start failed: {}", e);
                self.fail_start(e.to_string());
            }
        }
    }

    fn fail_start(&self, message: String) {
        {
            let mut state = self.state_mut();
            state.starting = false;
            state.start_in_flight = false;
            state.error = Some(message.clone());
        }
        self.publish_session(SessionStatus::Dead, message);
    }

    /// Explain a "no session" answer by listing the kernels the server offers.
    async fn no_kernel_message(&self) -> String {
        match self.inner.server.get_kernel_specs().await {
            Ok(specs) => {
                let names = specs.names();
                let found = if names.is_empty() {
                    "none".to_string()
                } else {
                    names.join(", ")
                };
                format!(
                    "No session started, are you sure the server has a '{}' kernel? Kernel specs found: {}",
                    self.inner.kernel.name, found
                )
            }
            Err(e) => format!("No session started and kernel specs could not be listed: {}", e),
        }
    }

    /// Restart the live session's kernel. No-op without a session.
    ///
    /// A restart requested while another is being serviced is coalesced: the
    /// servicing call runs at most one more restart once the current one
    /// finishes, and the second caller returns immediately.
    pub async fn restart(&self) {
        {
            let mut state = self.state_mut();
            if state.restarting {
                state.restart_pending = true;
                tracing::debug!(session = %self.name(), "restart already in progress, coalescing");
                return;
            }
            state.restarting = true;
        }

        loop {
            let session = self.state_mut().session.clone();
            if let Some(session) = session {
                self.restart_session(session).await;
            }

            let mut state = self.state_mut();
            if state.restart_pending {
                state.restart_pending = false;
                continue;
            }
            state.restarting = false;
            break;
        }
    }

    async fn restart_session(&self, session: Arc<dyn KernelSession>) {
        let kernel = session.kernel();
        let kernel_id = kernel.id().to_string();
        self.inner.bus.publish(StatusMessage::new(
            KernelStatus::Starting,
            kernel_id.as_str(),
            "kernel restarting",
        ));

        match session.restart().await {
            Ok(()) => {
                tracing::info!(session = %self.name(), kernel = %kernel_id, "kernel restarted");
                self.inner.bus.publish(StatusMessage::new(
                    KernelStatus::Ready,
                    kernel_id.as_str(),
                    "kernel restarted",
                ));
            }
            Err(e) => {
                tracing::warn!(session = %self.name(), kernel = %kernel_id, "restart failed: {}", e);
                {
                    let mut state = self.state_mut();
                    state.ready = false;
                    state.session = None;
                    state.error = Some(e.to_string());
                }
                self.inner.bus.publish(StatusMessage::new(
                    KernelStatus::Dead,
                    kernel_id.as_str(),
                    e.to_string(),
                ));
                self.publish_session(SessionStatus::Dead, format!("restart failed: {}", e));
            }
        }
    }

    /// Shut the live session down. Idempotent.
    pub async fn shutdown(&self) {
        let Some(session) = self.session() else {
            return;
        };

        if let Err(e) = session.shutdown().await {
            tracing::warn!(session = %self.name(), "session shutdown failed: {}", e);
        }

        {
            let mut state = self.state_mut();
            state.ready = false;
            state.session = None;
        }
        tracing::info!(session = %self.name(), id = %session.id(), "session shut down");
        self.publish_session(SessionStatus::Dead, "session shut down");
    }

    /// Watch the server's readiness and start the session automatically.
    ///
    /// On every transition to ready, `start` runs once if the auto-start
    /// policy is enabled and a start has been requested.
    pub fn spawn_auto_start(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut ready = self.inner.server.ready();

        tokio::spawn(async move {
            let mut was_ready = false;
            loop {
                let now_ready = *ready.borrow_and_update();
                if now_ready && !was_ready {
                    manager.auto_start_once().await;
                }
                was_ready = now_ready;

                if ready.changed().await.is_err() {
                    tracing::debug!(session = %manager.name(), "server readiness channel closed");
                    break;
                }
            }
        })
    }

    async fn auto_start_once(&self) {
        if !self.inner.options.auto_start {
            return;
        }
        let requested = {
            let state = self.state_mut();
            state.starting && !state.start_in_flight
        };
        if requested {
            tracing::debug!(session = %self.name(), "server ready, auto-starting session");
            self.start().await;
        }
    }

    /// Guard tying the session to an owning scope.
    pub fn scope(&self) -> SessionScope {
        SessionScope {
            manager: self.clone(),
        }
    }
}

/// Owning scope of a session.
///
/// When dropped with `shutdown_on_teardown` enabled, a shutdown is spawned
/// on the current runtime and nobody waits for it.
pub struct SessionScope {
    manager: SessionManager,
}

impl SessionScope {
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if !self.manager.inner.options.shutdown_on_teardown {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.manager.clone();
                handle.spawn(async move {
                    manager.shutdown().await;
                });
            }
            Err(_) => {
                tracing::warn!(session = %self.manager.name(), "no async runtime at teardown; session left running");
            }
        }
    }
}
