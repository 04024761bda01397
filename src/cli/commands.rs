use anyhow::{Context, Result};
use tracing::info;

use crate::config::RelayConfig;
use crate::server;

use super::config::{check_config, expand_path};
use super::template;

/// Execute CLI commands
pub async fn execute_command(cli: &super::Cli) -> Result<()> {
    use super::Commands;

    match &cli.command {
        Commands::Check { config, format } => {
            let config_path = expand_path(config)?;
            check_config(&config_path, format)?;
        }
        Commands::Template { output } => {
            template::generate_config_template(output.as_deref())?;
        }
        Commands::Run {
            config,
            listen,
            upstream,
        } => {
            let config = resolve_config(config.as_deref(), listen.as_deref(), upstream.as_deref())?;
            server::run_server(config).await?;
        }
    }

    Ok(())
}

/// 合并配置文件与命令行覆盖项
pub fn resolve_config(
    config: Option<&str>,
    listen: Option<&str>,
    upstream: Option<&str>,
) -> Result<RelayConfig> {
    let mut relay_config = match config {
        Some(path) => {
            let config_path = expand_path(path)?;
            info!("Loading relay configuration from: {}", config_path);
            RelayConfig::load(&config_path)?
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            RelayConfig::default()
        }
    };

    if let Some(addr) = listen {
        relay_config.listen_addr = addr.to_string();
    }
    if let Some(addr) = upstream {
        relay_config.upstream_addr = addr.to_string();
    }

    relay_config
        .validate()
        .context("Relay configuration validation failed")?;
    Ok(relay_config)
}
