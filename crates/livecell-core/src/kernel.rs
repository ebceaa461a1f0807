//! Contracts for the remote compute collaborators.
//!
//! The orchestration layer never talks to the network directly. It drives a
//! [`ComputeServer`] to obtain [`KernelSession`]s, and runs code through the
//! session's [`Kernel`]. Implementations live elsewhere (a Jupyter REST
//! connection in `livecell-server`, in-process fakes in tests).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::notebook::{CellOutput, ExecutionError};
use crate::status::KernelStatus;

/// Parameters of a session-start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Display name of the session.
    pub name: String,
    /// Working path of the session.
    pub path: String,
    /// Kernel specification to launch.
    pub kernel_name: String,
}

impl SessionRequest {
    /// Build a request that uses the logical session name as both display
    /// name and working path.
    pub fn for_slot(slot: &str, kernel_name: &str) -> Self {
        Self {
            name: slot.to_string(),
            path: slot.to_string(),
            kernel_name: kernel_name.to_string(),
        }
    }
}

/// Kernel specifications advertised by a compute server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpecs {
    /// Name of the default kernel, if the server has one.
    #[serde(default)]
    pub default: Option<String>,
    /// Specifications keyed by kernel name.
    #[serde(default)]
    pub kernelspecs: BTreeMap<String, KernelSpec>,
}

impl KernelSpecs {
    /// Kernel names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.kernelspecs.keys().map(String::as_str).collect()
    }
}

/// A single kernel specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    #[serde(default)]
    pub spec: KernelSpecInfo,
}

/// Descriptive part of a kernel specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpecInfo {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub language: String,
}

/// What the kernel sent back for one execute request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelReply {
    /// Outputs in the order the kernel produced them.
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
    /// Error raised by the executed code, if any.
    #[serde(default)]
    pub error: Option<ExecutionError>,
    /// Execution counter reported by the kernel.
    #[serde(default)]
    pub execution_count: Option<u32>,
}

/// Connection to a remote compute server.
#[async_trait]
pub trait ComputeServer: Send + Sync {
    /// Readiness of the connection. The value flips to `true` once the
    /// server accepts session requests.
    fn ready(&self) -> watch::Receiver<bool>;

    /// Current readiness.
    fn is_ready(&self) -> bool {
        *self.ready().borrow()
    }

    /// Request a new session.
    ///
    /// `Ok(None)` is the "no kernel available" condition: the server answered
    /// but did not produce a session.
    async fn start_new_session(&self, request: SessionRequest) -> Result<Option<Arc<dyn KernelSession>>>;

    /// List the kernel specifications the server can launch.
    async fn get_kernel_specs(&self) -> Result<KernelSpecs>;
}

/// A live session bound to one remote kernel.
#[async_trait]
pub trait KernelSession: Send + Sync {
    /// Server-assigned session identifier.
    fn id(&self) -> &str;

    /// Display name of the session.
    fn name(&self) -> &str;

    /// Whether the session can accept execute requests.
    fn is_ready(&self) -> bool;

    /// The kernel behind this session.
    fn kernel(&self) -> Arc<dyn Kernel>;

    /// Restart the session's kernel. The session identity is unchanged.
    async fn restart(&self) -> Result<()>;

    /// Shut the session down on the server.
    async fn shutdown(&self) -> Result<()>;
}

/// A remote kernel.
#[async_trait]
pub trait Kernel: Send + Sync {
    fn id(&self) -> &str;

    fn status(&self) -> KernelStatus;

    async fn restart(&self) -> Result<()>;

    /// Run `code` and collect the reply.
    ///
    /// An `Err` means the request itself was rejected (transport failure,
    /// dead kernel). Errors raised by the code are reported in
    /// [`KernelReply::error`].
    async fn execute(&self, code: &str) -> Result<KernelReply>;
}
