//! Kernelspecs command implementation.

use livecell_core::{Config, StatusBus};
use livecell_server::JupyterServer;

use crate::colors;

/// Print the kernel specs advertised by the compute server.
pub async fn execute(config: &Config) -> anyhow::Result<()> {
    let server = JupyterServer::new(config.server.clone(), StatusBus::new());
    let specs = server.kernel_specs().await?;

    println!(
        "\n{}Kernel specs{} at {}",
        colors::BOLD,
        colors::RESET,
        server.base_url()
    );
    println!("{}", "─".repeat(50));

    if specs.kernelspecs.is_empty() {
        println!("{}No kernel specs found.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    for (name, spec) in &specs.kernelspecs {
        let marker = if specs.default.as_deref() == Some(name.as_str()) {
            format!(" {}(default){}", colors::GREEN, colors::RESET)
        } else {
            String::new()
        };
        println!(
            "{}  ◆ {}{}{} {}{}{}",
            colors::CYAN,
            name,
            colors::RESET,
            marker,
            colors::DIM,
            spec.spec.display_name,
            colors::RESET
        );
    }

    Ok(())
}
