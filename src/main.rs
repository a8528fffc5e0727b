//! VMux media exporter
//!
//! Assembles ordered video clips with crossfades, mixes in a music bed and
//! exports the result through FFmpeg, preferring hardware encoders with
//! automatic software fallback.
//!
//! # Usage
//!
//! ```bash
//! vmux export --project project.json --output final.mkv
//! vmux preview --project project.json --play
//! vmux probe media/
//! vmux doctor
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vmux_cli::cli::{commands, Cli, Commands};
use vmux_cli::config::AppConfig;

/// Main entry point for the VMux CLI application
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load();

    match cli.command {
        Commands::Export(args) => {
            info!("Executing export command");
            commands::export(args, config).await?;
        }
        Commands::Preview(args) => {
            info!("Executing preview command");
            commands::preview(args, config).await?;
        }
        Commands::Probe(args) => {
            info!("Executing probe command");
            commands::probe(args, config).await?;
        }
        Commands::Doctor(args) => {
            info!("Executing doctor command");
            commands::doctor(args).await?;
        }
    }

    Ok(())
}
