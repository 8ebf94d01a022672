//! Command-line interface for BLE proximity detection.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Scan and print who is nearby on every report tick |
//! | `config` | Show, initialize or validate the configuration file |
//! | `parse-payload` | Decode an identity payload |
//!
//! # Configuration
//!
//! Settings live in `~/.config/nearby/config.toml` (or platform equivalent),
//! overridable with `--config` or `NEARBY_CONFIG`. See [`config::Config`].

mod cli;
mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::commands::{WatchArgs, cmd_config, cmd_parse_payload, cmd_watch};
use crate::config::{Config, default_config_path};
use crate::format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let opts = FormatOptions::new(cli.no_color);

    match &cli.command {
        Commands::Watch {
            format,
            count,
            events,
            report_interval_ms,
            demo,
        } => {
            let config = load_config(&cli)?;
            cmd_watch(WatchArgs {
                format: *format,
                count: *count,
                events: *events,
                report_interval_ms: *report_interval_ms,
                demo: *demo,
                quiet: cli.quiet,
                config: &config,
                opts: &opts,
            })
            .await?;
        }
        Commands::Config { action } => {
            // Init and validate read the file themselves
            let config = match action {
                ConfigAction::Show => load_config(&cli)?,
                _ => Config::default(),
            };
            cmd_config(*action, &config_path, &config, &opts)?;
        }
        Commands::ParsePayload { payload, format } => {
            cmd_parse_payload(payload, *format, &opts)?;
        }
    }

    Ok(())
}

/// Load the explicit config file, or the default one if it exists.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_validated(path)?,
        None => {
            let config = Config::load_default()?;
            config.validate()?;
            config
        }
    };
    tracing::debug!(roster = config.roster.len(), "Configuration loaded");
    Ok(config)
}
