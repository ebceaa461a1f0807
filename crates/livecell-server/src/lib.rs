//! livecell server.
//!
//! Connects the orchestration core to a real compute server and exposes it
//! to page-side clients.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Jupyter**: REST connection implementing the core's compute-server,
//!   session and kernel contracts
//! - **Bridge**: Maps client commands onto the session manager and orchestrator
//! - **Protocol**: Defines client/server message types
//! - **Routes**: HTTP and WebSocket handlers

pub mod bridge;
pub mod error;
pub mod jupyter;
pub mod protocol;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use livecell_core::{
    Cell, Config, Notebook, NotebookOrchestrator, SessionManager, StatusBus, magic_stripper,
};

pub use bridge::Bridge;
pub use error::{ServerError, ServerResult};
pub use jupyter::{JupyterKernel, JupyterServer, JupyterSession, KernelTransport, ServerInfo};
pub use protocol::{CellSnapshot, ClientMessage, ServerMessage};
pub use routes::{AppState, create_router};

/// Bridge server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Strip IPython magics from cell sources before execution.
    pub strip_magics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            strip_magics: true,
        }
    }
}

/// Serve `cells` as one notebook backed by the compute server in `core`.
pub async fn serve(config: ServerConfig, core: Config, cells: Vec<Cell>) -> ServerResult<()> {
    let bus = StatusBus::new();

    let jupyter = Arc::new(JupyterServer::new(core.server.clone(), bus.clone()));
    let manager = SessionManager::from_config(jupyter.clone(), &core, bus.clone());

    let orchestrator = NotebookOrchestrator::new(bus.clone());
    orchestrator.set_notebook(Arc::new(Notebook::new("main", cells, bus.clone())));

    let mut bridge = Bridge::new(manager.clone(), orchestrator);
    if config.strip_magics {
        bridge = bridge.with_preprocessor(magic_stripper());
    }

    let attach_task = bridge.spawn_attach_watcher();
    let auto_start_task = manager.spawn_auto_start();
    let connect_task = {
        let jupyter = jupyter.clone();
        tokio::spawn(async move {
            if let Err(e) = jupyter.connect().await {
                tracing::error!("{}", e);
            }
        })
    };

    let app = create_router(Arc::new(AppState { bridge }));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", config.host, config.port)))?;

    tracing::info!("Starting livecell bridge at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    connect_task.abort();
    auto_start_task.abort();
    attach_task.abort();

    if core.session.shutdown_on_teardown {
        manager.shutdown().await;
    }
    jupyter.close();

    tracing::info!("Server shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(config.strip_magics);
    }
}
