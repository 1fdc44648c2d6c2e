// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for uabridge.
//!
//! # Loading Pipeline
//!
//! 1. Read the file
//! 2. Expand `${VAR}` / `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON by file extension
//! 4. Apply `UABRIDGE_*` environment overrides
//! 5. Resolve relative paths against the config file directory
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UABRIDGE_OPCUA_ENDPOINT=opc.tcp://plc:4840
//! UABRIDGE_OPCUA_SECURITY_POLICY=Basic256Sha256
//! UABRIDGE_OPCUA_SECURITY_MODE=SignAndEncrypt
//! UABRIDGE_HTTP_PORT=8080
//! UABRIDGE_LOG_LEVEL=debug
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AppConfig, LogLevel};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uabridge_opcua::{SecurityMode, SecurityPolicy};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for uabridge.
///
/// # Examples
///
/// ```no_run
/// use uabridge_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("uabridge.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "UABRIDGE".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            self.resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        info!(
            endpoint = %config.opcua.endpoint,
            points = config.points.len(),
            "Configuration loaded"
        );
        for warning in config.warnings() {
            debug!(warning = %warning, "Configuration warning");
        }

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Reads file content.
    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Parses content based on format.
    fn parse_content(&self, content: &str, format: ConfigFormat, path: &Path) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Resolves environment variable placeholders in content.
    ///
    /// Supports the format: `${VAR_NAME}` or `${VAR_NAME:default}`
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (env::var(var_name), default_value) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!(variable = var_name, "Environment variable not found");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let Some(value) = self.env("OPCUA_ENDPOINT") {
            config.opcua.endpoint = value;
        }

        if let Some(value) = self.env("OPCUA_SECURITY_POLICY") {
            config.opcua.security_policy = value.parse::<SecurityPolicy>().map_err(|e| {
                ConfigError::invalid_env_var(self.env_name("OPCUA_SECURITY_POLICY"), e.to_string())
            })?;
        }

        if let Some(value) = self.env("OPCUA_SECURITY_MODE") {
            config.opcua.security_mode = value.parse::<SecurityMode>().map_err(|e| {
                ConfigError::invalid_env_var(self.env_name("OPCUA_SECURITY_MODE"), e.to_string())
            })?;
        }

        if let Some(value) = self.env("HTTP_PORT") {
            config.http.port = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(self.env_name("HTTP_PORT"), "expected valid port number")
            })?;
        }

        if let Some(value) = self.env("LOG_LEVEL") {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!(value = %value, "Ignoring unknown log level override"),
            }
        }

        Ok(())
    }

    fn env_name(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key)
    }

    fn env(&self, key: &str) -> Option<String> {
        env::var(self.env_name(key)).ok()
    }

    /// Resolves relative paths in configuration.
    fn resolve_relative_paths(&self, config: &mut AppConfig, base_path: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_path.join(&*path);
            }
        };

        if let Some(ref mut cert_path) = config.opcua.certificate_path {
            resolve(cert_path);
        }
        if let Some(ref mut key_path) = config.opcua.private_key_path {
            resolve(key_path);
        }
        resolve(&mut config.opcua.pki_dir);
        resolve(&mut config.logging.log_dir);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    base_path: Option<PathBuf>,
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    resolve_paths: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables path resolution.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = Some(enabled);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();

        if let Some(base_path) = self.base_path {
            loader.base_path = Some(base_path);
        }
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }
        if let Some(resolve_paths) = self.resolve_paths {
            loader.resolve_paths = resolve_paths;
        }

        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses a string based on format.
fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML parsing through the config crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// # Examples
///
/// ```no_run
/// use uabridge_config::loader::load_config;
///
/// let config = load_config("uabridge.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_test_yaml() -> String {
        r#"
opcua:
  endpoint: opc.tcp://plc.local:4840
  security_policy: None
  security_mode: None
  publishing_interval: 500ms
  backoff:
    initial_delay: 1s
    max_delay: 1m

points:
  - display_name: FlowTransmitter
    remote_node_id: ns=2;s=D1.Tag1
    unit: l/min
  - display_name: Valve
    remote_node_id: ns=2;s=D1.Tag2

http:
  port: 8080

logging:
  level: debug
  log_to_file: true
  log_dir: ./logs
"#
        .to_string()
    }

    fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(&create_test_yaml(), ".yaml");

        let loader = ConfigLoader::new().with_env_prefix("UABRIDGE_TEST_LOAD_YAML");
        let config = loader.load(file.path()).unwrap();

        assert_eq!(config.opcua.endpoint, "opc.tcp://plc.local:4840");
        assert_eq!(config.opcua.publishing_interval, Duration::from_millis(500));
        assert_eq!(config.opcua.backoff.max_delay, Duration::from_secs(60));
        assert_eq!(config.points.len(), 2);
        assert_eq!(config.points[0].unit.as_deref(), Some("l/min"));
        assert!(config.points[1].unit.is_none());
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_relative_paths_resolved() {
        let file = write_temp(&create_test_yaml(), ".yaml");
        let base = file.path().parent().unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("UABRIDGE_TEST_PATHS")
            .load(file.path())
            .unwrap();

        assert!(config.logging.log_dir.starts_with(base));
        assert!(config.opcua.pki_dir.starts_with(base));
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[opcua]
endpoint = "opc.tcp://plc.local:4840"

[[points]]
display_name = "Level"
remote_node_id = "ns=2;i=1001"
unit = "m"
"#;
        let file = write_temp(toml, ".toml");
        let config = ConfigLoader::new()
            .with_env_prefix("UABRIDGE_TEST_TOML")
            .load(file.path())
            .unwrap();
        assert_eq!(config.points[0].display_name, "Level");
        assert_eq!(config.http.port, 5000);
    }

    #[test]
    fn test_load_json_rejects_duplicates() {
        let json = r#"{
            "opcua": { "endpoint": "opc.tcp://plc.local:4840" },
            "points": [
                { "display_name": "Valve", "remote_node_id": "ns=2;s=A" },
                { "display_name": "Valve", "remote_node_id": "ns=2;s=B" }
            ]
        }"#;
        let file = write_temp(json, ".json");
        let result = ConfigLoader::new()
            .with_env_prefix("UABRIDGE_TEST_JSON")
            .load(file.path());
        assert!(matches!(result, Err(ConfigError::Bridge(_))));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let file = write_temp("opcua: [not, a, map", ".yaml");
        let result = ConfigLoader::new()
            .with_env_prefix("UABRIDGE_TEST_PARSE")
            .load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("config.txt")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_env_placeholders("endpoint: ${UABRIDGE_TEST_UNSET_VAR:opc.tcp://x:4840}");
        assert_eq!(result, "endpoint: opc.tcp://x:4840");
    }

    #[test]
    fn test_env_placeholder_unset_kept() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_env_placeholders("a: ${UABRIDGE_TEST_UNSET_OTHER} b: ${open");
        assert_eq!(result, "a: ${UABRIDGE_TEST_UNSET_OTHER} b: ${open");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UABRIDGE_TEST_OVR_OPCUA_ENDPOINT", "opc.tcp://override:4841");
        env::set_var("UABRIDGE_TEST_OVR_HTTP_PORT", "9090");
        env::set_var("UABRIDGE_TEST_OVR_LOG_LEVEL", "warning");

        let loader = ConfigLoader::new().with_env_prefix("UABRIDGE_TEST_OVR");
        let config = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(config.opcua.endpoint, "opc.tcp://override:4841");
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_env_override_invalid_port() {
        env::set_var("UABRIDGE_TEST_BADPORT_HTTP_PORT", "eighty");
        let loader = ConfigLoader::new().with_env_prefix("UABRIDGE_TEST_BADPORT");
        let result = loader.load_from_str(&create_test_yaml(), ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("MYAPP")
            .resolve_env_vars(false)
            .resolve_paths(true)
            .build();

        assert_eq!(loader.env_prefix, "MYAPP");
        assert!(!loader.resolve_env_vars);
        assert!(loader.resolve_paths);
    }

    #[test]
    fn test_file_not_found() {
        let loader = ConfigLoader::new();
        let result = loader.load("/nonexistent/path/uabridge.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
