// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for uabridge.
//!
//! # Schema Structure
//!
//! ```text
//! AppConfig
//! ├── opcua: SessionConfig              (from uabridge-opcua)
//! ├── points: Vec<SubscriptionDescriptor>
//! ├── http: HttpConfig
//! └── logging: LoggingConfig
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use uabridge_opcua::{BridgeConfig, NodeId, NodeRegistry, SessionConfig, SubscriptionDescriptor};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default number of decimals floats are rounded to in HTTP responses.
pub const DEFAULT_FLOAT_DECIMALS: u32 = 2;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for uabridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Upstream OPC UA session.
    pub opcua: SessionConfig,

    /// Monitored points in display order.
    #[serde(default)]
    pub points: Vec<SubscriptionDescriptor>,

    /// HTTP adapter.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates the whole configuration.
    ///
    /// Session settings and the point list are checked by the bridge's own
    /// rules, so a configuration that passes here also starts.
    pub fn validate(&self) -> ConfigResult<()> {
        self.opcua.validate()?;
        NodeRegistry::build(self.points.clone())?;
        self.http.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Non-fatal findings worth reporting to an operator.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.opcua.security_policy.is_deprecated() {
            warnings.push(format!(
                "Security policy '{}' is deprecated",
                self.opcua.security_policy
            ));
        }
        if self.opcua.security_mode.is_none() {
            warnings.push("Session is not secured (security mode None)".to_string());
        }
        if self.points.is_empty() {
            warnings.push("No points configured".to_string());
        }
        for point in &self.points {
            if let Err(e) = point.remote_node_id.parse::<NodeId>() {
                warnings.push(format!("Point '{}': {}", point.display_name, e));
            }
        }
        if self.opcua.stale_after <= self.opcua.publishing_interval {
            warnings.push(format!(
                "stale_after ({:?}) does not exceed publishing_interval ({:?})",
                self.opcua.stale_after, self.opcua.publishing_interval
            ));
        }

        warnings
    }

    /// Splits off the part of the configuration the bridge consumes.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new(self.opcua.clone(), self.points.clone())
    }
}

// =============================================================================
// HTTP Configuration
// =============================================================================

/// HTTP adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Listen port.
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Whether CORS headers are sent.
    #[serde(default = "default_enabled")]
    pub cors_enabled: bool,

    /// Allowed origins; empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Decimals floats are rounded to; `None` returns them unrounded.
    #[serde(default = "default_float_decimals")]
    pub float_decimals: Option<u32>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_enabled() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_float_decimals() -> Option<u32> {
    Some(DEFAULT_FLOAT_DECIMALS)
}

impl HttpConfig {
    /// Validates the HTTP configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::validation("http.port", "cannot be zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::validation("http.request_timeout", "cannot be zero"));
        }
        if matches!(self.float_decimals, Some(d) if d > 10) {
            return Err(ConfigError::validation("http.float_decimals", "must be at most 10"));
        }
        Ok(())
    }

    /// Returns the socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_HTTP_PORT,
            cors_enabled: true,
            allowed_origins: Vec::new(),
            request_timeout: default_request_timeout(),
            float_decimals: default_float_decimals(),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Also write a daily rolling log file.
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory of the log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_to_file && self.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "logging.log_dir",
                "required when log_to_file is enabled",
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            log_to_file: false,
            log_dir: default_log_dir(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name; `warning` is accepted for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            opcua: SessionConfig::new("opc.tcp://plc:4840"),
            points: vec![
                SubscriptionDescriptor::new("FlowTransmitter", "ns=2;s=D1.Tag1").with_unit("l/min"),
                SubscriptionDescriptor::new("Valve", "ns=2;s=D1.Tag2"),
            ],
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_http_defaults() {
        let http = HttpConfig::default();
        assert_eq!(http.port, 5000);
        assert_eq!(http.socket_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(http.float_decimals, Some(2));
        assert!(http.cors_enabled);
    }

    #[test]
    fn test_validate_ok() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_point() {
        let mut config = config();
        config.points.push(SubscriptionDescriptor::new("Valve", "ns=2;s=D1.Tag3"));
        let error = config.validate().unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Bridge(uabridge_opcua::ConfigError::DuplicateDisplayName { .. })
        ));
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = config();
        config.http.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_warnings() {
        let mut config = config();
        assert_eq!(config.warnings().len(), 1);

        config.points.push(SubscriptionDescriptor::new("Broken", "D1.Tag9"));
        let warnings = config.warnings();
        assert!(warnings.iter().any(|w| w.contains("Broken")));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_bridge_config() {
        let bridge = config().bridge_config();
        assert_eq!(bridge.points.len(), 2);
        assert_eq!(bridge.session.endpoint, "opc.tcp://plc:4840");
    }
}
