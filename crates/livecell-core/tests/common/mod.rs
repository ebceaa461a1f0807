//! In-process compute server, session and kernel used by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use livecell_core::{
    CellOutput, ComputeServer, Error, ExecutionError, Kernel, KernelReply, KernelSession,
    KernelSpec, KernelSpecs, KernelStatus, Result, SessionRequest, StatusBus, StatusMessage,
};

// =============================================================================
// Kernel
// =============================================================================

/// Kernel that echoes its input.
///
/// Source containing `raise` produces a kernel-reported error; source
/// containing `reject` makes the request itself fail.
pub struct FakeKernel {
    id: String,
    executed: Mutex<Vec<String>>,
    restarts: AtomicUsize,
}

impl FakeKernel {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            executed: Mutex::new(Vec::new()),
            restarts: AtomicUsize::new(0),
        }
    }

    /// Sources received, in dispatch order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Kernel for FakeKernel {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> KernelStatus {
        KernelStatus::Ready
    }

    async fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, code: &str) -> Result<KernelReply> {
        self.executed.lock().unwrap().push(code.to_string());

        if code.contains("reject") {
            return Err(Error::Kernel("connection reset".to_string()));
        }
        if code.contains("raise") {
            return Ok(KernelReply {
                outputs: vec![CellOutput::stdout("before the error\n")],
                error: Some(ExecutionError::new("ValueError", "boom")),
                execution_count: None,
            });
        }
        Ok(KernelReply {
            outputs: vec![CellOutput::text(code)],
            error: None,
            execution_count: Some(1),
        })
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct FakeSession {
    id: String,
    name: String,
    kernel: Arc<FakeKernel>,
    restarts: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_restart: AtomicBool,
    restart_delay: Duration,
}

impl FakeSession {
    pub fn new(id: &str, name: &str, restart_delay: Duration) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kernel: Arc::new(FakeKernel::new(&format!("{}-kernel", id))),
            restarts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            fail_restart: AtomicBool::new(false),
            restart_delay,
        }
    }

    pub fn fake_kernel(&self) -> Arc<FakeKernel> {
        self.kernel.clone()
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn fail_restarts(&self) {
        self.fail_restart.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KernelSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn kernel(&self) -> Arc<dyn Kernel> {
        self.kernel.clone()
    }

    async fn restart(&self) -> Result<()> {
        if !self.restart_delay.is_zero() {
            tokio::time::sleep(self.restart_delay).await;
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(Error::Kernel("kernel died during restart".to_string()));
        }
        self.kernel.restart().await
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Server
// =============================================================================

/// What the fake server answers to a session-start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    Session,
    NoSession,
    NetworkError,
}

pub struct FakeServer {
    ready: watch::Sender<bool>,
    behavior: Mutex<StartBehavior>,
    kernel_names: Vec<String>,
    restart_delay: Duration,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    requests: Mutex<Vec<SessionRequest>>,
}

impl FakeServer {
    pub fn new(ready: bool) -> Arc<Self> {
        Self::with_kernels(ready, &["python3"])
    }

    pub fn with_kernels(ready: bool, kernel_names: &[&str]) -> Arc<Self> {
        Self::build(ready, kernel_names, Duration::ZERO)
    }

    /// Server whose sessions take `delay` to restart.
    pub fn with_restart_delay(delay: Duration) -> Arc<Self> {
        Self::build(true, &["python3"], delay)
    }

    fn build(ready: bool, kernel_names: &[&str], restart_delay: Duration) -> Arc<Self> {
        let (tx, _rx) = watch::channel(ready);
        Arc::new(Self {
            ready: tx,
            behavior: Mutex::new(StartBehavior::Session),
            kernel_names: kernel_names.iter().map(|s| s.to_string()).collect(),
            restart_delay,
            sessions: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    pub fn set_behavior(&self, behavior: StartBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeServer for FakeServer {
    fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    async fn start_new_session(&self, request: SessionRequest) -> Result<Option<Arc<dyn KernelSession>>> {
        self.requests.lock().unwrap().push(request.clone());
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            StartBehavior::Session => {
                let mut sessions = self.sessions.lock().unwrap();
                let id = format!("session-{}", sessions.len() + 1);
                let session = Arc::new(FakeSession::new(&id, &request.name, self.restart_delay));
                sessions.push(session.clone());
                Ok(Some(session))
            }
            StartBehavior::NoSession => Ok(None),
            StartBehavior::NetworkError => Err(Error::Server("connection refused".to_string())),
        }
    }

    async fn get_kernel_specs(&self) -> Result<KernelSpecs> {
        let kernelspecs: BTreeMap<String, KernelSpec> = self
            .kernel_names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    KernelSpec {
                        name: name.clone(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Ok(KernelSpecs {
            default: self.kernel_names.first().cloned(),
            kernelspecs,
        })
    }
}

// =============================================================================
// Status recording
// =============================================================================

/// Subscribe to `bus` and collect every message.
pub fn record(bus: &StatusBus) -> (livecell_core::Subscription, Arc<Mutex<Vec<StatusMessage>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = bus.subscribe(move |msg| sink.lock().unwrap().push(msg.clone()));
    (subscription, seen)
}
