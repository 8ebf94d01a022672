//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "nearby")]
#[command(author, version, about = "Detect nearby people from BLE proximity beacons", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "NEARBY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan and report who is nearby
    Watch {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Number of reports before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Also print discovery and handshake events
        #[arg(short, long)]
        events: bool,

        /// Report interval in milliseconds (overrides config)
        #[arg(long)]
        report_interval_ms: Option<u64>,

        /// Use simulated peers instead of the Bluetooth adapter
        #[arg(long)]
        demo: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Parse an identity payload ("<user id>,<name>")
    ParsePayload {
        /// Payload text as read from the identity characteristic
        payload: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Configuration subcommands
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the configuration file for errors
    Validate,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_defaults() {
        let cli = Cli::try_parse_from(["nearby", "watch"]).unwrap();
        match cli.command {
            Commands::Watch {
                format,
                count,
                events,
                report_interval_ms,
                demo,
            } => {
                assert_eq!(format, OutputFormat::Text);
                assert_eq!(count, 0);
                assert!(!events);
                assert!(report_interval_ms.is_none());
                assert!(!demo);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nearby", "config", "show", "-q", "--config", "x.toml"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }
}
