//! Serve command implementation.
//!
//! Starts the WebSocket bridge for a set of cell files.

use std::path::{Path, PathBuf};

use livecell_core::{Cell, CellId, Config};
use livecell_server::ServerConfig;

use crate::colors;

/// Read one cell per file; the file stem is the cell id.
fn load_cells(paths: &[PathBuf]) -> anyhow::Result<Vec<Cell>> {
    paths
        .iter()
        .map(|path| {
            let source = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Cannot read cell {}: {}", path.display(), e))?;
            let id = path
                .file_stem()
                .map(|stem| CellId::new(stem.to_string_lossy()));
            Ok(Cell::new(id, source))
        })
        .collect()
}

/// Start the bridge server.
pub async fn execute(
    cell_paths: &[PathBuf],
    host: String,
    port: u16,
    strip_magics: bool,
    config: Config,
) -> anyhow::Result<()> {
    let cells = load_cells(cell_paths)?;

    println!("\n{}livecell{} - WebSocket bridge", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));

    if cells.is_empty() {
        println!("{}  ◆ No cell files given{}", colors::YELLOW, colors::RESET);
    }
    for (path, cell) in cell_paths.iter().zip(&cells) {
        println!(
            "{}  ◆ Cell {}:{} {}",
            colors::CYAN,
            cell.id(),
            colors::RESET,
            display(path)
        );
    }

    println!(
        "{}  ◆ Compute server:{} {} (kernel {})",
        colors::CYAN,
        colors::RESET,
        config.server.base_url,
        config.kernel.name
    );

    let server_config = ServerConfig {
        host,
        port,
        strip_magics,
    };

    println!(
        "{}  ◆ WebSocket:{} ws://{}:{}/ws",
        colors::CYAN,
        colors::RESET,
        server_config.host,
        server_config.port
    );
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    livecell_server::serve(server_config, config, cells).await?;

    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
