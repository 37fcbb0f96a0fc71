//! CLI entry point for teradl.

use anyhow::Result;
use clap::Parser;
use teradl_core::AppConfig;
use tracing::{debug, info};

mod cli;
mod commands;
mod progress;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = AppConfig::load(args.config.as_deref(), args.strategy)?;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), "config loaded");
    }
    info!(strategy = %loaded.config.strategy, "teradl starting");

    match args.command {
        Command::Resolve { link, json } => {
            commands::run_resolve_command(&loaded.config, &link, json).await
        }
        Command::Fetch {
            link,
            output,
            no_progress,
        } => {
            commands::run_fetch_command(&loaded.config, &link, &output, !(no_progress || args.quiet))
                .await
        }
        Command::Config => commands::run_config_show_command(&loaded),
    }
}
