// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use uabridge_config::ConfigLoader;

use crate::cli::Cli;
use crate::error::BinResult;
use crate::logging::{init_logging, LogSettings};
use crate::runtime::BridgeRuntime;

/// Loads the configuration, installs logging and runs the bridge until
/// SIGINT or SIGTERM.
pub async fn run(cli: &Cli) -> BinResult<()> {
    let config = ConfigLoader::new().load(&cli.config)?;

    let _log_guard = init_logging(&LogSettings::resolve(cli, &config.logging))?;
    for warning in config.warnings() {
        tracing::warn!(%warning, "Configuration warning");
    }

    BridgeRuntime::new(config).run().await
}
