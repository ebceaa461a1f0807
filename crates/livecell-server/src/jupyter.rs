//! Compute-server connection speaking the Jupyter Server REST API.
//!
//! Sessions, kernel specs and kernel restarts go through REST. Executing
//! code needs the kernel messaging channel, which is not part of this
//! crate: plug one in through [`KernelTransport`]. Without one, every
//! execute request fails with [`livecell_core::Error::TransportUnavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use livecell_core::{
    ComputeServer, Kernel, KernelReply, KernelSession, KernelSpecs, KernelStatus, ServerOptions,
    ServerStatus, SessionRequest, StatusBus, StatusMessage,
};

use crate::error::{ServerError, ServerResult};

/// Sends execute requests to a running kernel.
#[async_trait]
pub trait KernelTransport: Send + Sync {
    async fn execute(&self, kernel_id: &str, code: &str) -> livecell_core::Result<KernelReply>;
}

/// `GET /api/status` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub started: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub connections: u32,
    #[serde(default)]
    pub kernels: u32,
}

/// Session model returned by `/api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub kernel: KernelModel,
}

/// Kernel model embedded in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub execution_state: Option<String>,
}

#[derive(Serialize)]
struct CreateSession<'a> {
    name: &'a str,
    path: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    kernel: KernelName<'a>,
}

#[derive(Serialize)]
struct KernelName<'a> {
    name: &'a str,
}

#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ServerResult<T> {
        let url = self.url(path);
        let response = self.http.get(&url).send().await?;
        let response = ensure_success(response, "GET", url)?;
        Ok(response.json().await?)
    }

    async fn post(&self, path: &str) -> ServerResult<()> {
        let url = self.url(path);
        let response = self.http.post(&url).send().await?;
        ensure_success(response, "POST", url)?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> ServerResult<()> {
        let url = self.url(path);
        let response = self.http.delete(&url).send().await?;
        ensure_success(response, "DELETE", url)?;
        Ok(())
    }
}

fn ensure_success(
    response: reqwest::Response,
    method: &'static str,
    url: String,
) -> ServerResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServerError::Status {
            method,
            url,
            status: status.as_u16(),
        })
    }
}

/// Connection to a Jupyter Server.
pub struct JupyterServer {
    rest: RestClient,
    options: ServerOptions,
    ready: watch::Sender<bool>,
    bus: StatusBus,
    transport: Option<Arc<dyn KernelTransport>>,
}

impl JupyterServer {
    pub fn new(options: ServerOptions, bus: StatusBus) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            rest: RestClient::new(&options.base_url),
            options,
            ready,
            bus,
            transport: None,
        }
    }

    /// Use `transport` to run code on kernels of this server.
    pub fn with_transport(mut self, transport: Arc<dyn KernelTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.rest.base_url
    }

    /// Poll `/api/status` until the server answers.
    ///
    /// Publishes `launching`, then `ready` or `failed`. Readiness flips to
    /// `true` on success.
    pub async fn connect(&self) -> ServerResult<ServerInfo> {
        self.bus.publish(StatusMessage::global(
            ServerStatus::Launching,
            format!("connecting to {}", self.base_url()),
        ));

        let interval = Duration::from_millis(self.options.ready_poll_interval_ms);
        let attempts = self.options.max_ready_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.status().await {
                Ok(info) => {
                    self.ready.send_replace(true);
                    tracing::info!(url = %self.base_url(), kernels = info.kernels, "compute server ready");
                    self.bus.publish(StatusMessage::global(
                        ServerStatus::Ready,
                        format!("connected to {}", self.base_url()),
                    ));
                    return Ok(info);
                }
                Err(e) => {
                    tracing::debug!(attempt, "compute server not ready: {}", e);
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::warn!(url = %self.base_url(), "compute server unreachable: {}", reason);
        self.bus.publish(StatusMessage::global(ServerStatus::Failed, reason));
        Err(ServerError::Unreachable {
            url: self.base_url().to_string(),
            attempts,
        })
    }

    /// Mark the connection closed.
    pub fn close(&self) {
        self.ready.send_replace(false);
        self.bus
            .publish(StatusMessage::global(ServerStatus::Closed, "connection closed"));
    }

    pub async fn status(&self) -> ServerResult<ServerInfo> {
        self.rest.get("/api/status").await
    }

    pub async fn kernel_specs(&self) -> ServerResult<KernelSpecs> {
        self.rest.get("/api/kernelspecs").await
    }
}

#[async_trait]
impl ComputeServer for JupyterServer {
    fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    async fn start_new_session(
        &self,
        request: SessionRequest,
    ) -> livecell_core::Result<Option<Arc<dyn KernelSession>>> {
        let body = CreateSession {
            name: &request.name,
            path: &request.path,
            kind: "notebook",
            kernel: KernelName {
                name: &request.kernel_name,
            },
        };

        let response = self
            .rest
            .http
            .post(self.rest.url("/api/sessions"))
            .json(&body)
            .send()
            .await
            .map_err(ServerError::from)?;

        if !response.status().is_success() {
            tracing::warn!(
                status = response.status().as_u16(),
                kernel = %request.kernel_name,
                "server refused session request"
            );
            return Ok(None);
        }

        let model: SessionModel = response.json().await.map_err(ServerError::from)?;
        tracing::debug!(session = %model.id, kernel = %model.kernel.id, "session created");
        let session = JupyterSession::new(model, self.rest.clone(), self.transport.clone());
        Ok(Some(Arc::new(session)))
    }

    async fn get_kernel_specs(&self) -> livecell_core::Result<KernelSpecs> {
        Ok(self.kernel_specs().await?)
    }
}

/// A session on a Jupyter Server.
pub struct JupyterSession {
    id: String,
    name: String,
    path: String,
    rest: RestClient,
    kernel: Arc<JupyterKernel>,
    live: AtomicBool,
}

impl JupyterSession {
    fn new(model: SessionModel, rest: RestClient, transport: Option<Arc<dyn KernelTransport>>) -> Self {
        let kernel = JupyterKernel::new(model.kernel, rest.clone(), transport);
        Self {
            id: model.id,
            name: model.name,
            path: model.path,
            rest,
            kernel: Arc::new(kernel),
            live: AtomicBool::new(true),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl KernelSession for JupyterSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.live.load(Ordering::SeqCst) && self.kernel.status() != KernelStatus::Dead
    }

    fn kernel(&self) -> Arc<dyn Kernel> {
        self.kernel.clone()
    }

    async fn restart(&self) -> livecell_core::Result<()> {
        self.kernel.restart().await
    }

    async fn shutdown(&self) -> livecell_core::Result<()> {
        self.live.store(false, Ordering::SeqCst);
        self.kernel.set_status(KernelStatus::Dead);
        self.rest.delete(&format!("/api/sessions/{}", self.id)).await?;
        Ok(())
    }
}

/// A kernel on a Jupyter Server.
pub struct JupyterKernel {
    id: String,
    name: String,
    rest: RestClient,
    status: Mutex<KernelStatus>,
    transport: Option<Arc<dyn KernelTransport>>,
}

impl JupyterKernel {
    fn new(model: KernelModel, rest: RestClient, transport: Option<Arc<dyn KernelTransport>>) -> Self {
        let status = match model.execution_state.as_deref() {
            Some("starting") => KernelStatus::Starting,
            Some("dead") => KernelStatus::Dead,
            _ => KernelStatus::Ready,
        };
        Self {
            id: model.id,
            name: model.name,
            rest,
            status: Mutex::new(status),
            transport,
        }
    }

    /// Kernel spec name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn set_status(&self, status: KernelStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }
}

#[async_trait]
impl Kernel for JupyterKernel {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> KernelStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn restart(&self) -> livecell_core::Result<()> {
        self.set_status(KernelStatus::Starting);
        match self.rest.post(&format!("/api/kernels/{}/restart", self.id)).await {
            Ok(()) => {
                self.set_status(KernelStatus::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_status(KernelStatus::Dead);
                Err(e.into())
            }
        }
    }

    async fn execute(&self, code: &str) -> livecell_core::Result<KernelReply> {
        match &self.transport {
            Some(transport) => transport.execute(&self.id, code).await,
            None => Err(livecell_core::Error::TransportUnavailable),
        }
    }
}
