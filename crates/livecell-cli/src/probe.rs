//! Probe command implementation.
//!
//! Connects to the compute server, printing every status transition, and
//! optionally round-trips a session.

use std::sync::Arc;

use livecell_core::{Config, SessionManager, StatusBus, StatusMessage};
use livecell_server::JupyterServer;

use crate::colors;

fn print_status(msg: &StatusMessage) {
    let color = match msg.status.to_string().as_str() {
        "ready" | "completed" => colors::GREEN,
        "failed" | "dead" | "error" => colors::RED,
        _ => colors::DIM,
    };
    println!("{}  {}{}", color, msg, colors::RESET);
}

/// Check the compute server and, if asked, its session lifecycle.
pub async fn execute(config: &Config, with_session: bool) -> anyhow::Result<()> {
    let bus = StatusBus::new();
    let _subscription = bus.subscribe(print_status);

    let server = Arc::new(JupyterServer::new(config.server.clone(), bus.clone()));
    println!("\n{}Probing{} {}", colors::BOLD, colors::RESET, server.base_url());
    println!("{}", "─".repeat(50));

    let info = server.connect().await?;
    println!(
        "{}  ◆ Kernels running:{} {}   {}◆ Connections:{} {}",
        colors::CYAN,
        colors::RESET,
        info.kernels,
        colors::CYAN,
        colors::RESET,
        info.connections
    );

    if with_session {
        let manager = SessionManager::from_config(server.clone(), config, bus);
        manager.start().await;
        if let Some(error) = manager.error() {
            server.close();
            anyhow::bail!(error);
        }
        manager.shutdown().await;
    }

    server.close();
    Ok(())
}
