// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! Console output in text, compact or JSON form, plus an optional daily
//! rolling file written through a non-blocking appender. `RUST_LOG` wins
//! over the configured level.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};
use uabridge_config::{LogFormat, LoggingConfig};

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

/// Crates whose default output drowns the bridge's own events.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "tower=warn", "opcua=warn", "axum=info"];

/// File name prefix of the rolling log file.
const LOG_FILE_PREFIX: &str = "uabridge.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// =============================================================================
// LogSettings
// =============================================================================

/// Effective logging settings after merging the config file and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `uabridge_opcua=debug`.
    pub level: String,
    /// Console format.
    pub format: LogFormat,
    /// Directory of the rolling log file, if file logging is enabled.
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// Merges the config file's logging section with command-line overrides.
    pub fn resolve(cli: &Cli, config: &LoggingConfig) -> Self {
        Self {
            level: cli
                .log_level_override()
                .map(str::to_string)
                .unwrap_or_else(|| config.level.as_str().to_string()),
            format: cli.log_format.map(Into::into).unwrap_or(config.format),
            file_dir: config.log_to_file.then(|| config.log_dir.clone()),
        }
    }
}

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the global subscriber.
///
/// The returned guard flushes the log file when dropped and must be held
/// for the lifetime of the process.
///
/// # Errors
///
/// `Initialization` if the level is not a valid filter, the log directory
/// cannot be created, or a subscriber is already installed.
pub fn init_logging(settings: &LogSettings) -> BinResult<Option<WorkerGuard>> {
    let filter = build_filter(&settings.level)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(settings.format)];

    let guard = match &settings.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                BinError::init(format!("Failed to create log directory {}: {}", dir.display(), e))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(file_layer(settings.format, writer));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| BinError::init(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// Builds the filter from `RUST_LOG`, falling back to `level`.
fn build_filter(level: &str) -> BinResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level)
        .map_err(|e| BinError::init(format!("Invalid log level '{}': {}", level, e)))?;
    for directive in QUIET_TARGETS {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    match format {
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(is_terminal)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(is_terminal)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Text | LogFormat::Compact => {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uabridge_config::LogLevel;

    fn logging_config() -> LoggingConfig {
        LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            log_to_file: true,
            log_dir: PathBuf::from("/var/log/uabridge"),
        }
    }

    #[test]
    fn test_resolve_uses_config_without_overrides() {
        let cli = Cli::parse_from(["uabridge"]);
        let settings = LogSettings::resolve(&cli, &logging_config());
        assert_eq!(settings.level, "warn");
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.file_dir, Some(PathBuf::from("/var/log/uabridge")));
    }

    #[test]
    fn test_resolve_cli_overrides() {
        let cli = Cli::parse_from(["uabridge", "-v", "--log-format", "compact"]);
        let settings = LogSettings::resolve(&cli, &logging_config());
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.format, LogFormat::Compact);
    }

    #[test]
    fn test_resolve_without_file() {
        let cli = Cli::parse_from(["uabridge"]);
        let settings = LogSettings::resolve(&cli, &LoggingConfig::default());
        assert_eq!(settings.level, "info");
        assert!(settings.file_dir.is_none());
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                build_filter("uabridge=loud"),
                Err(BinError::Initialization(_))
            ));
        }
    }
}
