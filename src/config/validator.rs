use anyhow::{bail, Result};
use std::net::SocketAddr;

use super::RelayConfig;

/// 配置验证器 - 负责所有配置验证逻辑
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证地址不为空
    pub fn validate_address(addr: &str, context: &str) -> Result<()> {
        if addr.trim().is_empty() {
            bail!("{}: address cannot be empty", context);
        }
        Ok(())
    }

    /// 验证 `host:port` 形式的端点地址
    ///
    /// 可以是 IP 地址，也可以是待解析的主机名；端口必须在 1-65535 之间。
    pub fn validate_endpoint(addr: &str, context: &str) -> Result<()> {
        Self::validate_address(addr, context)?;

        if addr.parse::<SocketAddr>().is_ok() {
            return Ok(());
        }

        let (host, port) = match addr.rsplit_once(':') {
            Some(parts) => parts,
            None => bail!("{}: '{}' must be in host:port form", context, addr),
        };
        if host.trim().is_empty() {
            bail!("{}: '{}' is missing a host", context, addr);
        }
        match port.parse::<u16>() {
            Ok(0) | Err(_) => bail!("{}: '{}' has an invalid port", context, addr),
            Ok(_) => Ok(()),
        }
    }

    /// 验证注入的头部行
    pub fn validate_header_line(line: &str) -> Result<()> {
        if line.contains('\r') || line.contains('\n') {
            bail!("inject_header must be a single line without CR or LF");
        }
        let (name, _) = match line.split_once(':') {
            Some(parts) => parts,
            None => bail!("inject_header '{}' must be in 'Name: value' form", line),
        };
        if name.trim().is_empty() || name != name.trim() {
            bail!("inject_header '{}' has an invalid header name", line);
        }
        Ok(())
    }

    /// 验证转发服务配置
    pub fn validate_relay_config(config: &RelayConfig) -> Result<()> {
        Self::validate_endpoint(&config.listen_addr, "Relay listen_addr")?;
        Self::validate_endpoint(&config.upstream_addr, "Relay upstream_addr")?;
        Self::validate_header_line(&config.inject_header)?;
        Ok(())
    }
}
