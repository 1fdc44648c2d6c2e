// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the bridge (default)
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uabridge - OPC UA subscription-and-cache bridge
///
/// Keeps a live cache of OPC UA values and serves it over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "uabridge",
    author = "Sylvex <contact@sylvex.io>",
    version = uabridge_opcua::VERSION,
    about = "OPC UA subscription-and-cache bridge",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uabridge.yaml",
        env = "UABRIDGE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the bridge
    ///
    /// This is the default command when no subcommand is specified.
    /// Connects to the OPC UA server and serves the value cache over HTTP.
    Run,

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without connecting.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormat> for uabridge_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => Self::Text,
            LogFormat::Json => Self::Json,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// The log level requested on the command line, if any.
    ///
    /// `-q` and `-v` win over `-l`.
    pub fn log_level_override(&self) -> Option<&str> {
        if self.quiet {
            Some("warn")
        } else if self.verbose {
            Some("debug")
        } else {
            self.log_level.as_deref()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["uabridge"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run));
        assert_eq!(cli.config, PathBuf::from("uabridge.yaml"));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["uabridge", "validate", "--show-config", "-f", "json", "--strict"]);
        if let Some(Commands::Validate(args)) = cli.command {
            assert!(args.show_config);
            assert!(args.strict);
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["uabridge", "-c", "/etc/uabridge/plant.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/uabridge/plant.toml"));
    }

    #[test]
    fn test_log_level_override() {
        let cli = Cli::parse_from(["uabridge", "-l", "trace"]);
        assert_eq!(cli.log_level_override(), Some("trace"));

        let cli = Cli::parse_from(["uabridge"]);
        assert_eq!(cli.log_level_override(), None);
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["uabridge", "-q", "-l", "trace"]);
        assert_eq!(cli.log_level_override(), Some("warn"));

        let cli = Cli::parse_from(["uabridge", "-v"]);
        assert_eq!(cli.log_level_override(), Some("debug"));

        assert!(Cli::try_parse_from(["uabridge", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_log_format() {
        let cli = Cli::parse_from(["uabridge", "--log-format", "json", "run"]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(
            uabridge_config::LogFormat::from(LogFormat::Compact),
            uabridge_config::LogFormat::Compact
        );
    }
}
