// 配置管理模块

mod validator;

pub use validator::ConfigValidator;

use crate::relay::DEFAULT_INJECT_HEADER;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// 默认客户端监听地址
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";

/// 默认上游地址
pub const DEFAULT_UPSTREAM_ADDR: &str = "127.0.0.1:9000";

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_upstream_addr() -> String {
    DEFAULT_UPSTREAM_ADDR.to_string()
}

fn default_inject_header() -> String {
    DEFAULT_INJECT_HEADER.to_string()
}

fn default_nodelay() -> bool {
    true
}

/// 转发服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 客户端监听地址
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 固定的上游地址
    #[serde(default = "default_upstream_addr")]
    pub upstream_addr: String,
    /// 追加到每个响应头部块的头部行
    #[serde(default = "default_inject_header")]
    pub inject_header: String,
    /// 是否设置 TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_addr: default_upstream_addr(),
            inject_header: default_inject_header(),
            nodelay: default_nodelay(),
        }
    }
}

impl RelayConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        ConfigValidator::validate_relay_config(self)
    }

    /// 从 TOML 文本解析，配置位于 `[relay]` 表下
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct RelayConfigWrapper {
            #[serde(default)]
            relay: RelayConfig,
        }

        let wrapper: RelayConfigWrapper =
            toml::from_str(content).context("Failed to parse relay configuration")?;
        wrapper
            .relay
            .validate()
            .context("Relay configuration validation failed")?;
        Ok(wrapper.relay)
    }

    /// 从文件加载配置
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::from_toml_str(&content)
    }
}
