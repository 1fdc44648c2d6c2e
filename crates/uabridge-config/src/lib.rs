// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-config
//!
//! Configuration management for the uabridge OPC UA bridge.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: Override selected values via `UABRIDGE_*` variables
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside the file
//! - **Validation**: the bridge's own rules plus HTTP and logging checks
//!
//! ## Quick Start
//!
//! ```no_run
//! use uabridge_config::loader::load_config;
//!
//! let config = load_config("uabridge.yaml").unwrap();
//!
//! println!("Endpoint: {}", config.opcua.endpoint);
//! println!("Points: {}", config.points.len());
//! ```
//!
//! ## Configuration Schema
//!
//! - `opcua` - Upstream session, security, timing and backoff
//! - `points` - Display name, remote node id and unit of every point
//! - `http` - HTTP adapter bind address, CORS and rounding
//! - `logging` - Level, format and optional log file
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! opcua:
//!   endpoint: "${PLC_ENDPOINT:opc.tcp://localhost:4840}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{
    AppConfig, HttpConfig, LogFormat, LogLevel, LoggingConfig, DEFAULT_FLOAT_DECIMALS,
    DEFAULT_HTTP_PORT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "uabridge-config");
    }
}
