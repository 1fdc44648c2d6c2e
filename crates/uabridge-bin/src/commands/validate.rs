// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::path::Path;

use uabridge_config::{load_config, AppConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = load_config(config_path)?;
    let warnings = config.warnings();

    let report = match args.format {
        OutputFormat::Text => text_report(config_path, &config, &warnings, args.show_config),
        OutputFormat::Json => json_report(config_path, &config, &warnings, args.show_config)?,
    };
    println!("{}", report);

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

fn text_report(path: &Path, config: &AppConfig, warnings: &[String], show_config: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("✓ Configuration is valid: {}\n\n", path.display()));
    out.push_str("Summary:\n");
    out.push_str(&format!("  Endpoint: {}\n", config.opcua.endpoint));
    out.push_str(&format!(
        "  Security: {} / {}\n",
        config.opcua.security_policy, config.opcua.security_mode
    ));
    out.push_str(&format!("  Points: {}\n", config.points.len()));
    out.push_str(&format!("  HTTP: {}\n", config.http.socket_addr()));

    if !warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in warnings {
            out.push_str(&format!("  ⚠ {}\n", warning));
        }
    }

    if show_config {
        out.push_str("\nParsed configuration:\n");
        out.push_str(
            &serde_json::to_string_pretty(config)
                .unwrap_or_else(|_| "(serialization error)".to_string()),
        );
        out.push('\n');
    }

    out
}

fn json_report(
    path: &Path,
    config: &AppConfig,
    warnings: &[String],
    show_config: bool,
) -> BinResult<String> {
    let output = serde_json::json!({
        "valid": true,
        "config_path": path.display().to_string(),
        "summary": {
            "endpoint": config.opcua.endpoint,
            "security_policy": config.opcua.security_policy.to_string(),
            "security_mode": config.opcua.security_mode.to_string(),
            "point_count": config.points.len(),
            "http_address": config.http.socket_addr().to_string(),
        },
        "warnings": warnings,
        "config": if show_config { Some(config) } else { None },
    });
    serde_json::to_string_pretty(&output)
        .map_err(|e| BinError::runtime(format!("Failed to render report: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    const CONFIG: &str = r#"
opcua:
  endpoint: "opc.tcp://plc:4840"
points:
  - display_name: FlowTransmitter
    remote_node_id: "ns=2;s=D1.Tag1"
    unit: "l/min"
  - display_name: Broken
    remote_node_id: "D1.Tag9"
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn cli_for(path: &Path) -> Cli {
        Cli::parse_from(["uabridge", "-c", path.to_str().unwrap(), "validate"])
    }

    #[test]
    fn test_validate_reports_warnings() {
        let file = write_config(CONFIG);
        let config = load_config(file.path()).unwrap();
        let warnings = config.warnings();

        let report = text_report(file.path(), &config, &warnings, false);
        assert!(report.contains("Points: 2"));
        assert!(report.contains("Broken"));
    }

    #[test]
    fn test_validate_json_report() {
        let file = write_config(CONFIG);
        let config = load_config(file.path()).unwrap();

        let report = json_report(file.path(), &config, &[], true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["valid"], true);
        assert_eq!(value["summary"]["point_count"], 2);
        assert_eq!(value["config"]["opcua"]["endpoint"], "opc.tcp://plc:4840");
    }

    #[test]
    fn test_validate_strict_fails_on_warnings() {
        let file = write_config(CONFIG);
        let args = ValidateArgs {
            strict: true,
            ..ValidateArgs::default()
        };
        let err = validate(&cli_for(file.path()), args).unwrap_err();
        assert!(matches!(err, BinError::Configuration(_)));
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = validate(&cli_for(&path), ValidateArgs::default()).unwrap_err();
        assert!(matches!(err, BinError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
