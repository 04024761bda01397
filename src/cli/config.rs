use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::RelayConfig;

#[derive(Serialize)]
struct CheckResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<RelayConfig>,
}

/// Expand path with tilde (~) and make it absolute
pub fn expand_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path);
    let path_buf = PathBuf::from(expanded.as_ref());

    if path_buf.is_absolute() {
        Ok(expanded.into_owned())
    } else {
        // Convert relative path to absolute
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&path_buf)
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid path: {}", path))
    }
}

/// Check configuration file format
pub fn check_config(config_path: &str, format: &str) -> Result<()> {
    let result = if Path::new(config_path).exists() {
        RelayConfig::load(config_path)
    } else {
        Err(anyhow::anyhow!(
            "Configuration file not found: {}",
            config_path
        ))
    };

    if format == "json" {
        let report = match &result {
            Ok(config) => CheckResult {
                valid: true,
                error: None,
                config: Some(config.clone()),
            },
            Err(e) => CheckResult {
                valid: false,
                error: Some(format!("{:#}", e)),
                config: None,
            },
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return result.map(|_| ());
    }

    println!("Checking configuration file: {}\n", config_path);
    match result {
        Ok(config) => {
            println!("✓ Listen address: {}", config.listen_addr);
            println!("✓ Upstream address: {}", config.upstream_addr);
            println!("✓ Injected header: {}", config.inject_header);
            println!("✓ TCP_NODELAY: {}", config.nodelay);
            println!("\n✓ Relay configuration is valid!");
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed!");
            println!("\nError details:");
            println!("{:#}", e);

            // Provide hints for common issues
            println!("\nCommon issues:");
            println!("  1. Check TOML syntax (brackets, quotes, commas)");
            println!("  2. Settings belong to the [relay] section");
            println!("  3. Addresses must be in host:port form with a port between 1 and 65535");
            println!("  4. inject_header must look like 'Name: value' on a single line");

            Err(e)
        }
    }
}
