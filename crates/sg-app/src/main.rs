//! Main application entry point

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> Result<()> {
    // Initialize tracing, `RUST_LOG` overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    debug!("{:?}", cli);

    let app = commands::App::from_config(cli.config.as_deref())?;
    app.run(cli.command)
}
