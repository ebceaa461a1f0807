//! livecell CLI - live code cells backed by a Jupyter Server.

mod colors;
mod kernelspecs;
mod probe;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use livecell_core::Config;

#[derive(Parser)]
#[command(name = "livecell")]
#[command(about = "Live code cells backed by a Jupyter Server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Compute server base URL (overrides the configuration file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Kernel spec name (overrides the configuration file)
    #[arg(long, global = true)]
    kernel: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the kernel specs the compute server offers
    Kernelspecs,

    /// Check that the compute server is reachable
    Probe {
        /// Also start and shut down a session
        #[arg(long)]
        session: bool,
    },

    /// Serve cells to page-side clients over WebSocket
    Serve {
        /// Source files, one cell each, in notebook order
        cells: Vec<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Start the session as soon as the compute server is ready
        #[arg(long)]
        auto_start: bool,

        /// Send cell sources unchanged, including IPython magics
        #[arg(long)]
        keep_magics: bool,
    },
}

/// Load the configuration file, if any, and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Cannot read config {}: {}", path.display(), e))?;
            Config::from_json(&json)?
        }
        None => Config::default(),
    };

    if let Some(url) = &cli.url {
        config.server.base_url = url.clone();
    }
    if let Some(kernel) = &cli.kernel {
        config.kernel.name = kernel.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Kernelspecs => kernelspecs::execute(&config).await?,

        Commands::Probe { session } => probe::execute(&config, session).await?,

        Commands::Serve {
            cells,
            port,
            host,
            auto_start,
            keep_magics,
        } => {
            let mut config = config;
            config.session.auto_start |= auto_start;
            serve::execute(&cells, host, port, !keep_magics, config).await?;
        }
    }

    Ok(())
}
